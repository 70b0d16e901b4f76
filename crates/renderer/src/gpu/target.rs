use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use scene::{
    Mesh, PerspectiveCamera, RenderTarget, ResourceId, ResourceReleaser, SceneGraph,
    TargetOptions,
};
use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::context::GpuContext;
use super::pipeline::{FrameAttachments, MeshPipeline};
use super::uniforms::{GpuVertex, LightRig, MeshUniforms};
use crate::window::logical_size;

/// Vertex data and per-mesh uniforms uploaded for one geometry.
struct MeshBuffers {
    vertices: wgpu::Buffer,
    vertex_count: u32,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl MeshBuffers {
    fn upload(device: &wgpu::Device, pipeline: &MeshPipeline, mesh: &Mesh) -> Self {
        let vertices: Vec<GpuVertex> = mesh
            .geometry
            .vertices()
            .into_iter()
            .map(GpuVertex::from)
            .collect();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mesh uniforms"),
            size: std::mem::size_of::<MeshUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh bind group"),
            layout: &pipeline.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });
        Self {
            vertices: vertex_buffer,
            vertex_count: vertices.len() as u32,
            uniforms,
            bind_group,
        }
    }

    fn destroy(self) {
        self.vertices.destroy();
        self.uniforms.destroy();
    }
}

struct GpuResources {
    context: GpuContext,
    pipeline: MeshPipeline,
    attachments: FrameAttachments,
    meshes: HashMap<ResourceId, MeshBuffers>,
}

impl GpuResources {
    fn rebuild_attachments(&mut self) {
        self.attachments = FrameAttachments::new(
            &self.context.device,
            self.context.config.format,
            self.context.size(),
            self.context.sample_count,
        );
    }
}

/// Window-backed render target drawing a [`SceneGraph`] with wgpu.
///
/// Geometry is uploaded on first draw and cached by [`ResourceId`] until it
/// is released. Sizes passed to [`RenderTarget::set_size`] are logical; the
/// swapchain is configured at that size times the pixel ratio.
pub struct GpuTarget {
    options: TargetOptions,
    logical_size: (u32, u32),
    pixel_ratio: f64,
    gpu: Option<GpuResources>,
    context_lost: bool,
}

impl std::fmt::Debug for GpuTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTarget")
            .field("logical_size", &self.logical_size)
            .field("pixel_ratio", &self.pixel_ratio)
            .field("uploaded_meshes", &self.uploaded_meshes())
            .field("context_lost", &self.context_lost)
            .finish()
    }
}

impl GpuTarget {
    pub fn new(window: Arc<Window>, options: TargetOptions) -> Result<Self> {
        let size = window.inner_size();
        let (logical_size, pixel_ratio) = initial_metrics(size, window.scale_factor());
        let context = GpuContext::new(
            window,
            (size.width, size.height),
            options.antialias,
            options.alpha,
        )?;
        let pipeline = MeshPipeline::new(
            &context.device,
            context.config.format,
            context.sample_count,
        );
        let attachments = FrameAttachments::new(
            &context.device,
            context.config.format,
            context.size(),
            context.sample_count,
        );
        Ok(Self {
            options,
            logical_size,
            pixel_ratio,
            gpu: Some(GpuResources {
                context,
                pipeline,
                attachments,
                meshes: HashMap::new(),
            }),
            context_lost: false,
        })
    }

    pub fn uploaded_meshes(&self) -> usize {
        self.gpu.as_ref().map_or(0, |gpu| gpu.meshes.len())
    }

    pub fn physical_size(&self) -> (u32, u32) {
        physical_size(self.logical_size, self.pixel_ratio)
    }

    fn apply_size(&mut self) {
        let (width, height) = self.physical_size();
        if let Some(gpu) = self.gpu.as_mut() {
            if gpu.context.resize(width, height) {
                gpu.rebuild_attachments();
                debug!(width, height, "render target resized");
            }
        }
    }
}

/// Logical size and pixel ratio of the window as created.
pub(crate) fn initial_metrics(size: PhysicalSize<u32>, scale_factor: f64) -> ((u32, u32), f64) {
    (logical_size(size, scale_factor), scale_factor)
}

/// Logical size scaled by the pixel ratio, never below 1x1.
pub(crate) fn physical_size((width, height): (u32, u32), ratio: f64) -> (u32, u32) {
    let scale = |value: u32| ((value as f64 * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

impl ResourceReleaser for GpuTarget {
    fn release_geometry(&mut self, id: ResourceId) {
        if let Some(buffers) = self.gpu.as_mut().and_then(|gpu| gpu.meshes.remove(&id)) {
            buffers.destroy();
            trace!(geometry = id.get(), "released mesh buffers");
        }
    }

    fn release_material(&mut self, id: ResourceId) {
        // Material parameters live in the per-mesh uniform buffer.
        trace!(material = id.get(), "released material");
    }
}

impl RenderTarget for GpuTarget {
    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
        self.apply_size();
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.logical_size = (width, height);
        self.apply_size();
    }

    fn size(&self) -> (u32, u32) {
        self.logical_size
    }

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> Result<()> {
        if self.context_lost {
            bail!("render target context was lost");
        }
        let Some(gpu) = self.gpu.as_mut() else {
            bail!("render target was disposed");
        };

        let frame = match gpu.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated; reconfiguring and skipping frame");
                gpu.context.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; retrying next frame");
                return Ok(());
            }
            Err(err) => bail!("failed to acquire surface texture: {err}"),
        };

        let lights = LightRig::from_lights(scene.lights());
        let meshes = scene.meshes();
        for mesh in &meshes {
            let buffers = gpu
                .meshes
                .entry(mesh.geometry.id())
                .or_insert_with(|| MeshBuffers::upload(&gpu.context.device, &gpu.pipeline, mesh));
            let uniforms = MeshUniforms::new(
                camera,
                mesh.transform.matrix(),
                &lights,
                mesh.material.primary(),
            );
            gpu.context
                .queue
                .write_buffer(&buffers.uniforms, 0, bytemuck::bytes_of(&uniforms));
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene encoder"),
            });
        {
            let [r, g, b, a] = self.options.clear_color;
            let (color_view, resolve_target) = gpu.attachments.color_targets(&view);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: gpu.attachments.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&gpu.pipeline.pipeline);
            for mesh in &meshes {
                if let Some(buffers) = gpu.meshes.get(&mesh.geometry.id()) {
                    pass.set_bind_group(0, &buffers.bind_group, &[]);
                    pass.set_vertex_buffer(0, buffers.vertices.slice(..));
                    pass.draw(0..buffers.vertex_count, 0..1);
                }
            }
        }

        gpu.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(gpu) = self.gpu.as_mut() {
            let count = gpu.meshes.len();
            for (_, buffers) in gpu.meshes.drain() {
                buffers.destroy();
            }
            debug!(leftover_meshes = count, "render target disposed");
        }
    }

    fn force_context_loss(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            gpu.context.device.destroy();
            debug!("GPU device destroyed");
        }
        self.context_lost = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_scales_and_rounds() {
        assert_eq!(physical_size((800, 600), 2.0), (1600, 1200));
        assert_eq!(physical_size((333, 101), 1.5), (500, 152));
        assert_eq!(physical_size((0, 0), 2.0), (1, 1));
    }

    #[test]
    fn hidpi_window_never_oversizes_during_setup() {
        let window = PhysicalSize::new(3840, 2160);
        let (logical, ratio) = initial_metrics(window, 2.0);
        assert_eq!(logical, (1920, 1080));
        assert_eq!(ratio, 2.0);

        // Capped ratio applied first, then the container size.
        let capped = 1.5;
        let after_ratio = physical_size(logical, capped);
        assert!(after_ratio.0 <= window.width && after_ratio.1 <= window.height);
        assert_eq!(physical_size((1920, 1080), capped), (2880, 1620));
    }
}
