use crate::config::SceneConfig;
use crate::graph::{Geometry, Light, Material, MaterialSlot, Mesh};
use crate::persist::SavedState;

/// Depth offset applied when no saved state exists, moving the cube slightly
/// away from the camera.
pub const DEFAULT_Z_POSITION: f64 = -1.0;

const DIRECTIONAL_INTENSITY: f64 = 1.0;

/// Builds the cube, seeded from `saved` when present.
///
/// Rotation and position groups apply independently. A saved state without a
/// position group leaves the cube at the origin; only a missing saved state
/// triggers the default depth offset.
pub fn create_cube(config: &SceneConfig, saved: Option<&SavedState>) -> Mesh {
    let mut material = Material::phong(config.cube_color);
    material.flat_shading = true;
    material.transparent = true;
    material.opacity = 1.0;

    let mut cube = Mesh::new(
        Geometry::cube(config.cube_size),
        MaterialSlot::Single(material),
    );

    match saved {
        Some(saved) => {
            if let Some(rotation) = saved.rotation_vec() {
                cube.transform.rotation = rotation;
            }
            if let Some(position) = saved.position_vec() {
                cube.transform.position = position;
            }
        }
        None => cube.transform.position.z = DEFAULT_Z_POSITION,
    }

    cube
}

/// Returns the directional light followed by the ambient fill light.
pub fn setup_lights(config: &SceneConfig) -> [Light; 2] {
    [
        Light::Directional {
            color: config.light_color,
            intensity: DIRECTIONAL_INTENSITY,
            position: config.directional_light_position,
        },
        Light::Ambient {
            color: config.light_color,
            intensity: config.ambient_intensity,
        },
    ]
}
