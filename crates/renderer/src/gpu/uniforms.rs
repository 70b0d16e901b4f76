use bytemuck::{Pod, Zeroable};
use glam::{DMat4, DVec3};
use scene::{Color, GeometryVertex, Light, Material, PerspectiveCamera};

/// Shininess and specular strength of the Phong material, matching a
/// `0x111111` specular colour.
const SHININESS: f32 = 30.0;
const SPECULAR_STRENGTH: f32 = 0x11 as f32 / 255.0;

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

unsafe impl Zeroable for GpuVertex {}
unsafe impl Pod for GpuVertex {}

impl From<GeometryVertex> for GpuVertex {
    fn from(vertex: GeometryVertex) -> Self {
        Self {
            position: vertex.position,
            normal: vertex.normal,
        }
    }
}

impl GpuVertex {
    pub(crate) const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Lights folded into what the shader consumes: one directional light plus
/// the summed ambient term.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LightRig {
    pub direction: [f32; 3],
    pub color: [f32; 3],
    pub ambient: [f32; 3],
}

impl LightRig {
    pub(crate) fn from_lights<'a>(lights: impl IntoIterator<Item = &'a Light>) -> Self {
        let mut rig = Self {
            direction: [0.0, 0.0, 1.0],
            color: [0.0; 3],
            ambient: [0.0; 3],
        };
        let mut have_directional = false;
        for light in lights {
            match light {
                Light::Directional {
                    color,
                    intensity,
                    position,
                } => {
                    if have_directional {
                        tracing::trace!("only the first directional light is shaded");
                        continue;
                    }
                    have_directional = true;
                    // Directional lights shine from their position toward the origin.
                    let direction = position.try_normalize().unwrap_or(DVec3::Z);
                    rig.direction = direction.as_vec3().to_array();
                    rig.color = scaled(*color, *intensity);
                }
                Light::Ambient { color, intensity } => {
                    let [r, g, b] = scaled(*color, *intensity);
                    rig.ambient[0] += r;
                    rig.ambient[1] += g;
                    rig.ambient[2] += b;
                }
            }
        }
        rig
    }
}

fn scaled(color: Color, intensity: f64) -> [f32; 3] {
    let [r, g, b] = color.to_rgb();
    let intensity = intensity as f32;
    [r * intensity, g * intensity, b * intensity]
}

#[repr(C, align(16))]
#[derive(Clone, Copy, Debug)]
pub(crate) struct MeshUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
    pub ambient_color: [f32; 4],
    pub material_color: [f32; 4],
    /// xyz camera position, w shininess.
    pub eye: [f32; 4],
    /// x specular strength.
    pub specular: [f32; 4],
}

unsafe impl Zeroable for MeshUniforms {}
unsafe impl Pod for MeshUniforms {}

impl MeshUniforms {
    pub(crate) fn new(
        camera: &PerspectiveCamera,
        model: DMat4,
        lights: &LightRig,
        material: Option<&Material>,
    ) -> Self {
        let (color, opacity) = material
            .map(|material| (material.color, material.opacity))
            .unwrap_or((Color::WHITE, 1.0));
        let [r, g, b] = color.to_rgb();
        let eye = camera.position().as_vec3();
        Self {
            view_proj: camera.view_projection().as_mat4().to_cols_array_2d(),
            model: model.as_mat4().to_cols_array_2d(),
            light_direction: extend(lights.direction, 0.0),
            light_color: extend(lights.color, 1.0),
            ambient_color: extend(lights.ambient, 1.0),
            material_color: [r, g, b, opacity],
            eye: [eye.x, eye.y, eye.z, SHININESS],
            specular: [SPECULAR_STRENGTH, 0.0, 0.0, 0.0],
        }
    }
}

fn extend([x, y, z]: [f32; 3], w: f32) -> [f32; 4] {
    [x, y, z, w]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_respect_std140_size() {
        assert_eq!(std::mem::size_of::<MeshUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<MeshUniforms>(), 224);
        assert_eq!(std::mem::size_of::<GpuVertex>(), 24);
    }

    #[test]
    fn rig_takes_first_directional_and_sums_ambient() {
        let lights = [
            Light::Directional {
                color: Color::WHITE,
                intensity: 1.0,
                position: DVec3::new(5.0, 5.0, 5.0),
            },
            Light::Ambient {
                color: Color::WHITE,
                intensity: 0.25,
            },
            Light::Ambient {
                color: Color::from_hex(0xff0000),
                intensity: 0.5,
            },
        ];
        let rig = LightRig::from_lights(&lights);
        let expected = 1.0 / 3.0f32.sqrt();
        for component in rig.direction {
            assert!((component - expected).abs() < 1e-6);
        }
        assert_eq!(rig.color, [1.0, 1.0, 1.0]);
        assert_eq!(rig.ambient, [0.75, 0.25, 0.25]);
    }

    #[test]
    fn missing_material_shades_white() {
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
        let rig = LightRig::from_lights(&[]);
        let uniforms = MeshUniforms::new(&camera, DMat4::IDENTITY, &rig, None);
        assert_eq!(uniforms.material_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniforms.model, glam::Mat4::IDENTITY.to_cols_array_2d());
    }
}
