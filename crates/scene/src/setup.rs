use glam::DVec3;
use tracing::{debug, error, warn};

use crate::camera::PerspectiveCamera;
use crate::config::{SceneConfig, Sizing};
use crate::host::{CanvasInfo, Host, RenderTarget, TargetOptions};

/// Distance of the camera from the origin along +Z.
pub const CAMERA_DISTANCE: f64 = 5.0;

/// Edge length used when a fixed-size target has no explicit size.
pub const FALLBACK_RENDER_SIZE: u32 = 300;

/// Width over height, or 1.0 when the height is zero.
pub fn aspect_ratio((width, height): (u32, u32)) -> f64 {
    if height == 0 {
        1.0
    } else {
        width as f64 / height as f64
    }
}

/// Clamps the device pixel ratio to `cap`; unusable device ratios count as 1.
pub fn effective_pixel_ratio(device_ratio: f64, cap: f64) -> f64 {
    let device_ratio = if device_ratio.is_finite() && device_ratio > 0.0 {
        device_ratio
    } else {
        1.0
    };
    device_ratio.min(cap)
}

/// Output size for `canvas` under the sizing policy.
pub fn resolve_surface_size<H>(host: &H, canvas: &CanvasInfo, sizing: Sizing) -> (u32, u32)
where
    H: Host + ?Sized,
{
    match sizing {
        Sizing::Fixed { width, height } => (width, height),
        Sizing::Container => {
            let (viewport_width, viewport_height) = host.viewport_size();
            let (width, height) = canvas.container_size;
            let width = if width == 0 { viewport_width } else { width };
            let height = if height == 0 { viewport_height } else { height };
            if width == 0 || height == 0 {
                (FALLBACK_RENDER_SIZE, FALLBACK_RENDER_SIZE)
            } else {
                (width, height)
            }
        }
    }
}

/// Binds a render target to the canvas `canvas_id`.
///
/// Returns `None` when the canvas cannot be found or the host fails to build
/// a target; the reason is logged.
pub fn init_renderer<H: Host>(
    host: &mut H,
    canvas_id: &str,
    config: &SceneConfig,
) -> Option<H::Target> {
    let Some(canvas) = host.canvas(canvas_id) else {
        warn!(canvas = canvas_id, "render target requested for unknown canvas");
        return None;
    };

    let mut target = match host.create_render_target(&canvas, &TargetOptions::default()) {
        Ok(target) => target,
        Err(err) => {
            error!(canvas = canvas_id, error = %format!("{err:#}"), "failed to create render target");
            return None;
        }
    };

    let (width, height) = resolve_surface_size(&*host, &canvas, config.sizing);
    let pixel_ratio = effective_pixel_ratio(host.device_pixel_ratio(), config.pixel_ratio_cap);
    target.set_pixel_ratio(pixel_ratio);
    target.set_size(width, height);
    debug!(
        canvas = canvas_id,
        width, height, pixel_ratio, "render target initialised"
    );
    Some(target)
}

/// Perspective camera from the configured frustum, placed at
/// [`CAMERA_DISTANCE`] on the +Z axis.
pub fn init_camera(config: &SceneConfig, aspect: f64) -> PerspectiveCamera {
    let mut camera = PerspectiveCamera::new(
        config.camera_fov,
        aspect,
        config.camera_near,
        config.camera_far,
    );
    camera.set_position(DVec3::new(0.0, 0.0, CAMERA_DISTANCE));
    camera
}
