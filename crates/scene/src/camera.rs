use glam::{DMat4, DVec3};

/// Perspective camera looking at the origin.
///
/// The projection matrix is rebuilt whenever a parameter changes, so aspect
/// and projection can never disagree between frames.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    fov_degrees: f64,
    aspect: f64,
    near: f64,
    far: f64,
    position: DVec3,
    projection: DMat4,
}

impl PerspectiveCamera {
    pub fn new(fov_degrees: f64, aspect: f64, near: f64, far: f64) -> Self {
        let mut camera = Self {
            fov_degrees,
            aspect: sanitize_aspect(aspect),
            near,
            far,
            position: DVec3::ZERO,
            projection: DMat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn fov_degrees(&self) -> f64 {
        self.fov_degrees
    }

    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    pub fn near(&self) -> f64 {
        self.near
    }

    pub fn far(&self) -> f64 {
        self.far
    }

    pub fn position(&self) -> DVec3 {
        self.position
    }

    pub fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    /// Updates the aspect ratio and the projection matrix together.
    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = sanitize_aspect(aspect);
        self.update_projection_matrix();
    }

    pub fn projection(&self) -> DMat4 {
        self.projection
    }

    pub fn view(&self) -> DMat4 {
        let up = if self.position.normalize_or_zero().abs().y > 0.999 {
            DVec3::Z
        } else {
            DVec3::Y
        };
        DMat4::look_at_rh(self.position, DVec3::ZERO, up)
    }

    pub fn view_projection(&self) -> DMat4 {
        self.projection * self.view()
    }

    fn update_projection_matrix(&mut self) {
        self.projection =
            DMat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far);
    }
}

fn sanitize_aspect(aspect: f64) -> f64 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}
