//! Native host for the cube scene.
//!
//! [`WindowHost`] implements the scene crate's `Host` trait on top of one
//! winit window, handing out [`GpuTarget`]s that draw the scene graph with
//! wgpu. [`FileStore`] keeps saved cube state as JSON files between runs.
//! [`run_window`] wires these into an event loop driven by a
//! `SceneRegistry`.

mod gpu;
mod store;
mod window;

pub use gpu::GpuTarget;
pub use store::FileStore;
pub use window::{run_window, FrameQueue, RunConfig, WindowHost};
