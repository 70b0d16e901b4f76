//! Scene lifecycle core for cubekeep.
//!
//! One [`SceneManager`] drives one rotating cube on one canvas. The host (a
//! window, a browser page, a test harness) is passed by `&mut` into every call
//! and supplies canvases, render targets, frame scheduling, resize
//! notifications, and an optional key-value store. The overall flow is:
//!
//! ```text
//!   SceneRegistry::page_load
//!          │
//!          ▼
//!   SceneManager::init ──▶ init_renderer ──▶ load_saved_state ──▶ create_cube
//!          │                                                        │
//!          ▼                                                        ▼
//!   AnimationDriver::start ◀──────────── SceneStateStore (target, scene, camera, cube)
//!          │
//!          └─▶ Host::request_frame ─▶ on_frame ─▶ tick ─▶ render ─▶ request_frame ...
//! ```
//!
//! [`SceneManager::cleanup`] stops the loop, persists the cube transform when
//! the [`PersistPolicy`] asks for it, and releases every GPU-backed resource
//! the state owns.

pub mod animation;
pub mod camera;
pub mod config;
pub mod error;
pub mod factory;
pub mod graph;
pub mod host;
pub mod manager;
pub mod persist;
pub mod registry;
pub mod setup;
pub mod state;

pub use animation::{advance_rotation, AnimationDriver, LoopPhase, TickOutcome};
pub use camera::PerspectiveCamera;
pub use config::{Color, PersistPolicy, SceneConfig, SceneConfigOverrides, Sizing};
pub use error::SceneError;
pub use factory::{create_cube, setup_lights, DEFAULT_Z_POSITION};
pub use graph::{
    dispose_resources, DisposalReport, Geometry, GeometryKind, GeometryVertex, Light, Material,
    MaterialSlot, Mesh, NodeId, NodeKind, ResourceId, ResourceReleaser, SceneGraph, SceneNode,
    Transform,
};
pub use host::{CanvasInfo, FrameToken, Host, HostEvent, RenderTarget, TargetOptions};
pub use manager::SceneManager;
pub use persist::{
    load_saved_state, save_state, storage_key, MemoryStore, SavedPosition, SavedRotation,
    SavedState, StateStore, StoreError,
};
pub use registry::SceneRegistry;
pub use setup::{
    aspect_ratio, effective_pixel_ratio, init_camera, init_renderer, resolve_surface_size,
    CAMERA_DISTANCE, FALLBACK_RENDER_SIZE,
};
pub use state::{FrameParts, SceneState, SceneStateStore, SceneStateUpdate, StateSummary};
