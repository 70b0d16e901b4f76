//! wgpu backend for scene render targets.
//!
//! - `context` owns the wgpu instance, device, and surface for one window and
//!   reconfigures the swapchain when the output size changes.
//! - `pipeline` builds the lit mesh pipeline plus the depth and MSAA
//!   attachments that track the surface size.
//! - `uniforms` packs camera, model, light, and material data for the shader.
//! - `target` glues them into [`GpuTarget`], the `RenderTarget` the window
//!   host hands to scene managers.

mod context;
mod pipeline;
mod target;
mod uniforms;

pub use target::GpuTarget;
