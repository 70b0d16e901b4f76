use std::fmt;
use std::str::FromStr;

use glam::DVec3;

use crate::error::SceneError;

/// 24-bit RGB colour stored as `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const WHITE: Color = Color(0xffffff);
    pub const BLACK: Color = Color(0x000000);

    /// Builds a colour from a packed `0xRRGGBB` value; the top byte is ignored.
    pub const fn from_hex(hex: u32) -> Self {
        Self(hex & 0x00ff_ffff)
    }

    pub const fn hex(self) -> u32 {
        self.0
    }

    /// Normalised `[r, g, b]` components in `0.0..=1.0`.
    pub fn to_rgb(self) -> [f32; 3] {
        let r = ((self.0 >> 16) & 0xff) as f32 / 255.0;
        let g = ((self.0 >> 8) & 0xff) as f32 / 255.0;
        let b = (self.0 & 0xff) as f32 / 255.0;
        [r, g, b]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// How the render target derives its output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// Follow the measured size of the canvas container, falling back to the
    /// host viewport when the container reports a zero dimension.
    Container,
    /// Always render at a fixed size.
    Fixed { width: u32, height: u32 },
}

impl Default for Sizing {
    fn default() -> Self {
        Self::Container
    }
}

/// When the cube transform is written to the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistPolicy {
    /// Write after every rendered frame.
    EveryFrame,
    /// Write once while tearing the scene down.
    OnCleanup,
    /// Never write; saved state is still read on start-up.
    Never,
}

impl Default for PersistPolicy {
    fn default() -> Self {
        Self::OnCleanup
    }
}

impl fmt::Display for PersistPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistPolicy::EveryFrame => f.write_str("every-frame"),
            PersistPolicy::OnCleanup => f.write_str("on-cleanup"),
            PersistPolicy::Never => f.write_str("never"),
        }
    }
}

impl FromStr for PersistPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "every-frame" | "frame" | "always" => Ok(Self::EveryFrame),
            "on-cleanup" | "cleanup" => Ok(Self::OnCleanup),
            "never" | "off" => Ok(Self::Never),
            other => Err(format!(
                "unknown persist policy '{other}'; expected 'every-frame', 'on-cleanup', or 'never'"
            )),
        }
    }
}

/// Immutable configuration for one managed canvas.
///
/// Every field has a default; callers override a subset through
/// [`SceneConfigOverrides`] and [`SceneConfig::merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Vertical field of view in degrees.
    pub camera_fov: f64,
    pub camera_near: f64,
    pub camera_far: f64,
    /// Colour shared by the directional and ambient lights.
    pub light_color: Color,
    pub ambient_intensity: f64,
    pub directional_light_position: DVec3,
    /// Edge length of the cube.
    pub cube_size: f64,
    pub cube_color: Color,
    /// Radians added to the x and y rotation on every frame.
    pub rotation_speed: f64,
    /// Upper bound on the device pixel ratio used for the render target.
    pub pixel_ratio_cap: f64,
    pub sizing: Sizing,
    pub persist_policy: PersistPolicy,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera_fov: 75.0,
            camera_near: 0.1,
            camera_far: 1000.0,
            light_color: Color::WHITE,
            ambient_intensity: 0.5,
            directional_light_position: DVec3::new(5.0, 5.0, 5.0),
            cube_size: 2.5,
            cube_color: Color::from_hex(0x00ff00),
            rotation_speed: 0.01,
            pixel_ratio_cap: 2.0,
            sizing: Sizing::default(),
            persist_policy: PersistPolicy::default(),
        }
    }
}

/// Partial configuration; `Some` fields replace the defaults on merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneConfigOverrides {
    pub camera_fov: Option<f64>,
    pub camera_near: Option<f64>,
    pub camera_far: Option<f64>,
    pub light_color: Option<Color>,
    pub ambient_intensity: Option<f64>,
    pub directional_light_position: Option<DVec3>,
    pub cube_size: Option<f64>,
    pub cube_color: Option<Color>,
    pub rotation_speed: Option<f64>,
    pub pixel_ratio_cap: Option<f64>,
    pub sizing: Option<Sizing>,
    pub persist_policy: Option<PersistPolicy>,
}

impl SceneConfig {
    /// Applies every override that is present, leaving the rest untouched.
    pub fn merge(mut self, overrides: SceneConfigOverrides) -> Self {
        let SceneConfigOverrides {
            camera_fov,
            camera_near,
            camera_far,
            light_color,
            ambient_intensity,
            directional_light_position,
            cube_size,
            cube_color,
            rotation_speed,
            pixel_ratio_cap,
            sizing,
            persist_policy,
        } = overrides;

        if let Some(value) = camera_fov {
            self.camera_fov = value;
        }
        if let Some(value) = camera_near {
            self.camera_near = value;
        }
        if let Some(value) = camera_far {
            self.camera_far = value;
        }
        if let Some(value) = light_color {
            self.light_color = value;
        }
        if let Some(value) = ambient_intensity {
            self.ambient_intensity = value;
        }
        if let Some(value) = directional_light_position {
            self.directional_light_position = value;
        }
        if let Some(value) = cube_size {
            self.cube_size = value;
        }
        if let Some(value) = cube_color {
            self.cube_color = value;
        }
        if let Some(value) = rotation_speed {
            self.rotation_speed = value;
        }
        if let Some(value) = pixel_ratio_cap {
            self.pixel_ratio_cap = value;
        }
        if let Some(value) = sizing {
            self.sizing = value;
        }
        if let Some(value) = persist_policy {
            self.persist_policy = value;
        }
        self
    }

    /// Checks the invariants the renderer and camera rely on.
    pub fn validate(&self) -> Result<(), SceneError> {
        let scalars = [
            ("camera_fov", self.camera_fov),
            ("camera_near", self.camera_near),
            ("camera_far", self.camera_far),
            ("ambient_intensity", self.ambient_intensity),
            ("cube_size", self.cube_size),
            ("rotation_speed", self.rotation_speed),
            ("pixel_ratio_cap", self.pixel_ratio_cap),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(SceneError::InvalidConfig(format!(
                    "{name} must be finite (got {value})"
                )));
            }
        }
        if !self.directional_light_position.is_finite() {
            return Err(SceneError::InvalidConfig(
                "directional_light_position must be finite".to_string(),
            ));
        }
        if self.camera_fov <= 0.0 || self.camera_fov >= 180.0 {
            return Err(SceneError::InvalidConfig(format!(
                "camera_fov must lie in (0, 180) degrees (got {})",
                self.camera_fov
            )));
        }
        if self.camera_near <= 0.0 || self.camera_near >= self.camera_far {
            return Err(SceneError::InvalidConfig(format!(
                "camera planes must satisfy 0 < near < far (got near={}, far={})",
                self.camera_near, self.camera_far
            )));
        }
        if self.pixel_ratio_cap <= 0.0 {
            return Err(SceneError::InvalidConfig(format!(
                "pixel_ratio_cap must be positive (got {})",
                self.pixel_ratio_cap
            )));
        }
        if self.cube_size <= 0.0 {
            return Err(SceneError::InvalidConfig(format!(
                "cube_size must be positive (got {})",
                self.cube_size
            )));
        }
        if let Sizing::Fixed { width, height } = self.sizing {
            if width == 0 || height == 0 {
                return Err(SceneError::InvalidConfig(format!(
                    "fixed render size must be non-zero (got {width}x{height})"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SceneConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn merge_replaces_only_present_fields() {
        let merged = SceneConfig::default().merge(SceneConfigOverrides {
            rotation_speed: Some(0.05),
            cube_color: Some(Color::from_hex(0xff0000)),
            ..Default::default()
        });
        assert_eq!(merged.rotation_speed, 0.05);
        assert_eq!(merged.cube_color.hex(), 0xff0000);
        assert_eq!(merged.camera_fov, 75.0);
        assert_eq!(merged.persist_policy, PersistPolicy::OnCleanup);
    }

    #[test]
    fn rejects_near_beyond_far() {
        let config = SceneConfig {
            camera_near: 10.0,
            camera_far: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SceneError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_non_positive_pixel_ratio_cap() {
        let config = SceneConfig {
            pixel_ratio_cap: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_persist_policy_aliases() {
        assert_eq!("frame".parse::<PersistPolicy>(), Ok(PersistPolicy::EveryFrame));
        assert_eq!(
            "On-Cleanup".parse::<PersistPolicy>(),
            Ok(PersistPolicy::OnCleanup)
        );
        assert!("sometimes".parse::<PersistPolicy>().is_err());
    }

    #[test]
    fn color_components_are_normalised() {
        let [r, g, b] = Color::from_hex(0xff8000).to_rgb();
        assert_eq!(r, 1.0);
        assert!((g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(b, 0.0);
        assert_eq!(Color::from_hex(0x12ff8000).hex(), 0xff8000);
        assert_eq!(Color::from_hex(0x00ff00).to_string(), "#00ff00");
    }
}
