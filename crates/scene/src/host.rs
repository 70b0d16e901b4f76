use anyhow::Result;

use crate::camera::PerspectiveCamera;
use crate::graph::{ResourceReleaser, SceneGraph};
use crate::persist::StateStore;

/// A drawable surface the host knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasInfo {
    pub id: String,
    /// Measured size of the element containing the canvas, in logical pixels.
    /// Either dimension may be zero when the container is not laid out yet.
    pub container_size: (u32, u32),
}

/// Options requested when binding a render target to a canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetOptions {
    pub antialias: bool,
    /// Keep an alpha channel so the page shows through cleared pixels.
    pub alpha: bool,
    pub clear_color: [f64; 4],
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            alpha: true,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Handle for one scheduled repaint callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(pub u64);

/// Lifecycle and scheduling events a host delivers to a [`crate::SceneRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A previously requested frame is due.
    Frame { canvas_id: String, token: FrameToken },
    /// The window changed size.
    Resize,
    /// The page is about to be replaced.
    BeforeSwap,
    /// A new page finished loading and shows the given canvas.
    PageLoad { canvas_id: String },
}

/// GPU-backed output bound to one canvas.
pub trait RenderTarget: ResourceReleaser {
    fn set_pixel_ratio(&mut self, ratio: f64);
    fn pixel_ratio(&self) -> f64;
    /// Sets the output size in logical pixels.
    fn set_size(&mut self, width: u32, height: u32);
    fn size(&self) -> (u32, u32);
    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) -> Result<()>;
    /// Frees every GPU resource the target still holds.
    fn dispose(&mut self);
    /// Abandons the underlying device context so the host can reclaim it.
    fn force_context_loss(&mut self);
}

/// Everything a scene needs from its environment.
///
/// All calls happen on one thread; the host is passed by `&mut` into each
/// manager call instead of being shared.
pub trait Host {
    type Target: RenderTarget;

    fn canvas(&self, id: &str) -> Option<CanvasInfo>;
    /// Size of the whole viewport, used when a container has no size yet.
    fn viewport_size(&self) -> (u32, u32);
    fn device_pixel_ratio(&self) -> f64;
    fn create_render_target(
        &mut self,
        canvas: &CanvasInfo,
        options: &TargetOptions,
    ) -> Result<Self::Target>;
    /// Schedules a frame callback for `canvas_id` on the next repaint.
    fn request_frame(&mut self, canvas_id: &str) -> FrameToken;
    fn cancel_frame(&mut self, token: FrameToken);
    fn subscribe_resize(&mut self, canvas_id: &str);
    fn unsubscribe_resize(&mut self, canvas_id: &str);
    /// Key-value storage, or `None` when storage is unavailable.
    fn store(&self) -> Option<&dyn StateStore>;
    fn store_mut(&mut self) -> Option<&mut dyn StateStore>;
}
