//! TOML overrides file for [`scene::SceneConfig`].
//!
//! Every key is optional; absent keys keep the built-in defaults.
//!
//! ```toml
//! version = 1
//!
//! [camera]
//! fov = 60
//! near = 0.5
//! far = 200
//!
//! [lights]
//! color = "#ffffff"
//! ambient_intensity = 0.4
//! directional_position = [5, 5, 5]
//!
//! [cube]
//! size = 2.5
//! color = "#00ff00"
//! rotation_speed = 0.01
//!
//! [render]
//! pixel_ratio_cap = 2
//! size = "container"      # or "800x600"
//! persist = "on-cleanup"  # "every-frame", "never"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use glam::DVec3;
use scene::{Color, PersistPolicy, SceneConfig, SceneConfigOverrides, Sizing};
use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneFile {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default)]
    pub lights: LightSection,
    #[serde(default)]
    pub cube: CubeSection,
    #[serde(default)]
    pub render: RenderSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraSection {
    pub fov: Option<f64>,
    pub near: Option<f64>,
    pub far: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LightSection {
    #[serde(default, deserialize_with = "deserialize_color_opt")]
    pub color: Option<Color>,
    pub ambient_intensity: Option<f64>,
    pub directional_position: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CubeSection {
    pub size: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_color_opt")]
    pub color: Option<Color>,
    pub rotation_speed: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderSection {
    pub pixel_ratio_cap: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_sizing_opt")]
    pub size: Option<Sizing>,
    #[serde(default, deserialize_with = "deserialize_persist_opt")]
    pub persist: Option<PersistPolicy>,
}

impl SceneFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }

    /// Checks what can be judged from the file alone. Cross-field checks
    /// against the defaults happen in [`SceneFile::apply`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(version) = self.version {
            if version != 1 {
                return Err(ConfigError::Invalid(format!(
                    "unsupported config version {version}; expected 1"
                )));
            }
        }

        if let (Some(near), Some(far)) = (self.camera.near, self.camera.far) {
            if near >= far {
                return Err(ConfigError::Invalid(format!(
                    "camera.near ({near}) must be less than camera.far ({far})"
                )));
            }
        }

        if let Some(speed) = self.cube.rotation_speed {
            if !speed.is_finite() {
                return Err(ConfigError::Invalid(
                    "cube.rotation_speed must be finite".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn overrides(&self) -> SceneConfigOverrides {
        SceneConfigOverrides {
            camera_fov: self.camera.fov,
            camera_near: self.camera.near,
            camera_far: self.camera.far,
            light_color: self.lights.color,
            ambient_intensity: self.lights.ambient_intensity,
            directional_light_position: self.lights.directional_position.map(DVec3::from_array),
            cube_size: self.cube.size,
            cube_color: self.cube.color,
            rotation_speed: self.cube.rotation_speed,
            pixel_ratio_cap: self.render.pixel_ratio_cap,
            sizing: self.render.size,
            persist_policy: self.render.persist,
        }
    }

    /// Merges the file over `base` and validates the result.
    pub fn apply(&self, base: SceneConfig) -> Result<SceneConfig, ConfigError> {
        let merged = base.merge(self.overrides());
        merged
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(merged)
    }
}

/// Parses `#rrggbb`, `0xrrggbb`, or bare `rrggbb`.
pub fn parse_color(raw: &str) -> Result<Color, String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("invalid colour '{raw}'; expected #rrggbb"));
    }
    u32::from_str_radix(digits, 16)
        .map(Color::from_hex)
        .map_err(|_| format!("invalid colour '{raw}'; expected #rrggbb"))
}

/// Parses `container` or `<width>x<height>`.
pub fn parse_sizing(raw: &str) -> Result<Sizing, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized == "container" || normalized == "auto" {
        return Ok(Sizing::Container);
    }
    let (width, height) = normalized
        .split_once('x')
        .ok_or_else(|| format!("invalid size '{raw}'; expected 'container' or WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{raw}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{raw}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size '{raw}' must be non-zero"));
    }
    Ok(Sizing::Fixed { width, height })
}

fn deserialize_color_opt<'de, D>(deserializer: D) -> Result<Option<Color>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    match helper {
        None => Ok(None),
        Some(Helper::Str(raw)) => parse_color(&raw).map(Some).map_err(de::Error::custom),
        Some(Helper::Num(value)) => {
            if !(0..=0xff_ffff).contains(&value) {
                return Err(de::Error::custom(format!(
                    "colour value {value:#x} is outside 0x000000..=0xffffff"
                )));
            }
            Ok(Some(Color::from_hex(value as u32)))
        }
    }
}

fn deserialize_sizing_opt<'de, D>(deserializer: D) -> Result<Option<Sizing>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|raw| parse_sizing(&raw).map_err(de::Error::custom))
        .transpose()
}

fn deserialize_persist_opt<'de, D>(deserializer: D) -> Result<Option<PersistPolicy>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|raw| raw.parse::<PersistPolicy>().map_err(de::Error::custom))
        .transpose()
}
