use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use scene::{
    CanvasInfo, FrameToken, Host, HostEvent, SceneConfig, SceneRegistry, StateStore,
    TargetOptions,
};
use tracing::{debug, info, warn};
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuTarget;
use crate::store::FileStore;

/// Settings for the preview window.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Id the window's canvas answers to.
    pub canvas_id: String,
    pub title: String,
    /// Initial inner size in logical pixels.
    pub window_size: (u32, u32),
    pub scene: SceneConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            canvas_id: "three-js-canvas".to_string(),
            title: "cubekeep".to_string(),
            window_size: (800, 600),
            scene: SceneConfig::default(),
        }
    }
}

/// Outstanding frame requests, keyed by token.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_token: u64,
    pending: BTreeMap<FrameToken, String>,
}

impl FrameQueue {
    pub fn request(&mut self, canvas_id: &str) -> FrameToken {
        self.next_token += 1;
        let token = FrameToken(self.next_token);
        self.pending.insert(token, canvas_id.to_string());
        token
    }

    pub fn cancel(&mut self, token: FrameToken) -> bool {
        self.pending.remove(&token).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Every pending request as a frame event, oldest first.
    pub fn drain_due(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(token, canvas_id)| HostEvent::Frame { canvas_id, token })
            .collect()
    }
}

/// [`Host`] over a single winit window that acts as one canvas.
pub struct WindowHost {
    window: Arc<Window>,
    canvas_id: String,
    frames: FrameQueue,
    resize_listeners: BTreeSet<String>,
    store: Option<FileStore>,
}

impl WindowHost {
    pub fn new(window: Arc<Window>, canvas_id: impl Into<String>, store: Option<FileStore>) -> Self {
        Self {
            window,
            canvas_id: canvas_id.into(),
            frames: FrameQueue::default(),
            resize_listeners: BTreeSet::new(),
            store,
        }
    }

    pub fn take_due_frames(&mut self) -> Vec<HostEvent> {
        self.frames.drain_due()
    }

    pub fn has_resize_listeners(&self) -> bool {
        !self.resize_listeners.is_empty()
    }

    fn logical_inner_size(&self) -> (u32, u32) {
        logical_size(self.window.inner_size(), self.window.scale_factor())
    }
}

pub(crate) fn logical_size(size: PhysicalSize<u32>, scale_factor: f64) -> (u32, u32) {
    let logical: LogicalSize<f64> = size.to_logical(scale_factor);
    (logical.width.round() as u32, logical.height.round() as u32)
}

impl Host for WindowHost {
    type Target = GpuTarget;

    fn canvas(&self, id: &str) -> Option<CanvasInfo> {
        (id == self.canvas_id).then(|| CanvasInfo {
            id: id.to_string(),
            container_size: self.logical_inner_size(),
        })
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.logical_inner_size()
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.scale_factor()
    }

    fn create_render_target(
        &mut self,
        canvas: &CanvasInfo,
        options: &TargetOptions,
    ) -> Result<GpuTarget> {
        debug!(canvas = %canvas.id, ?options, "creating GPU render target");
        GpuTarget::new(self.window.clone(), *options)
    }

    fn request_frame(&mut self, canvas_id: &str) -> FrameToken {
        let token = self.frames.request(canvas_id);
        self.window.request_redraw();
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.frames.cancel(token);
    }

    fn subscribe_resize(&mut self, canvas_id: &str) {
        self.resize_listeners.insert(canvas_id.to_string());
    }

    fn unsubscribe_resize(&mut self, canvas_id: &str) {
        self.resize_listeners.remove(canvas_id);
    }

    fn store(&self) -> Option<&dyn StateStore> {
        self.store.as_ref().map(|store| store as &dyn StateStore)
    }

    fn store_mut(&mut self) -> Option<&mut dyn StateStore> {
        self.store.as_mut().map(|store| store as &mut dyn StateStore)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Navigate,
    Quit,
}

fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Character(value) if value.eq_ignore_ascii_case("n") => Some(KeyAction::Navigate),
        Key::Character(value) if value.eq_ignore_ascii_case("q") => Some(KeyAction::Quit),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        _ => None,
    }
}

fn dispatch(registry: &mut SceneRegistry<GpuTarget>, host: &mut WindowHost, event: HostEvent) {
    if let Err(err) = registry.dispatch(host, event) {
        warn!(error = %err, "scene event failed");
    }
}

/// Opens the preview window and runs the scene until the window closes.
///
/// `N` replays a page navigation (cleanup, then a fresh scene on the same
/// canvas) so saved state can be observed surviving the swap. `Esc`, `Q`, or
/// closing the window cleans up every scene before exiting.
pub fn run_window(config: RunConfig, store: Option<FileStore>) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = config.window_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(LogicalSize::new(width, height))
        .with_transparent(true)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    if store.is_none() {
        warn!("no state directory available; cube state will not persist");
    }
    let mut host = WindowHost::new(window.clone(), config.canvas_id.clone(), store);
    let mut registry = SceneRegistry::new(config.scene.clone());
    let canvas_id = config.canvas_id;
    dispatch(
        &mut registry,
        &mut host,
        HostEvent::PageLoad {
            canvas_id: canvas_id.clone(),
        },
    );

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                WindowEvent::KeyboardInput { event, .. }
                    if event.state == ElementState::Pressed && !event.repeat =>
                {
                    match key_action(&event.logical_key) {
                        Some(KeyAction::Navigate) => {
                            info!(canvas = %canvas_id, "simulating page navigation");
                            dispatch(&mut registry, &mut host, HostEvent::BeforeSwap);
                            dispatch(
                                &mut registry,
                                &mut host,
                                HostEvent::PageLoad {
                                    canvas_id: canvas_id.clone(),
                                },
                            );
                        }
                        Some(KeyAction::Quit) => elwt.exit(),
                        None => {}
                    }
                }
                WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                    if host.has_resize_listeners() {
                        dispatch(&mut registry, &mut host, HostEvent::Resize);
                    }
                }
                WindowEvent::RedrawRequested => {
                    for frame in host.take_due_frames() {
                        dispatch(&mut registry, &mut host, frame);
                    }
                }
                _ => {}
            },
            Event::AboutToWait => elwt.set_control_flow(ControlFlow::Wait),
            Event::LoopExiting => {
                debug!("event loop exiting; cleaning up scenes");
                dispatch(&mut registry, &mut host, HostEvent::BeforeSwap);
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
