use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use anyhow::{bail, Result};
use glam::DVec3;
use scene::{
    storage_key, CanvasInfo, FrameToken, Host, HostEvent, LoopPhase, MemoryStore,
    PerspectiveCamera, PersistPolicy, RenderTarget, ResourceId, ResourceReleaser, SceneConfig,
    SceneError, SceneGraph, SceneManager, SceneRegistry, Sizing, StateStore, TargetOptions,
    TickOutcome, DEFAULT_Z_POSITION,
};

const CANVAS: &str = "three-js-canvas";

#[derive(Debug, Clone, PartialEq)]
enum TargetEvent {
    PixelRatio(f64),
    Size(u32, u32),
    Render,
    GeometryReleased(ResourceId),
    MaterialReleased(ResourceId),
    Disposed,
    ContextLost,
}

type EventLog = Rc<RefCell<Vec<TargetEvent>>>;

#[derive(Debug)]
struct RecordingTarget {
    log: EventLog,
    size: (u32, u32),
    pixel_ratio: f64,
}

impl ResourceReleaser for RecordingTarget {
    fn release_geometry(&mut self, id: ResourceId) {
        self.log.borrow_mut().push(TargetEvent::GeometryReleased(id));
    }

    fn release_material(&mut self, id: ResourceId) {
        self.log.borrow_mut().push(TargetEvent::MaterialReleased(id));
    }
}

impl RenderTarget for RecordingTarget {
    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
        self.log.borrow_mut().push(TargetEvent::PixelRatio(ratio));
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.log.borrow_mut().push(TargetEvent::Size(width, height));
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn render(&mut self, _scene: &SceneGraph, _camera: &PerspectiveCamera) -> Result<()> {
        self.log.borrow_mut().push(TargetEvent::Render);
        Ok(())
    }

    fn dispose(&mut self) {
        self.log.borrow_mut().push(TargetEvent::Disposed);
    }

    fn force_context_loss(&mut self) {
        self.log.borrow_mut().push(TargetEvent::ContextLost);
    }
}

struct FakeHost {
    canvases: BTreeMap<String, (u32, u32)>,
    viewport: (u32, u32),
    device_pixel_ratio: f64,
    next_token: u64,
    pending: BTreeMap<FrameToken, String>,
    frames_requested: usize,
    resize_listeners: Vec<String>,
    store: Option<MemoryStore>,
    fail_targets: bool,
    log: EventLog,
}

impl FakeHost {
    fn new() -> Self {
        let mut canvases = BTreeMap::new();
        canvases.insert(CANVAS.to_string(), (800, 600));
        Self {
            canvases,
            viewport: (1280, 720),
            device_pixel_ratio: 1.0,
            next_token: 1,
            pending: BTreeMap::new(),
            frames_requested: 0,
            resize_listeners: Vec::new(),
            store: Some(MemoryStore::new()),
            fail_targets: false,
            log: Rc::default(),
        }
    }

    fn without_canvas() -> Self {
        let mut host = Self::new();
        host.canvases.clear();
        host
    }

    /// Pops the oldest pending frame, as the host's repaint would.
    fn next_frame(&mut self) -> Option<(String, FrameToken)> {
        let token = *self.pending.keys().next()?;
        let canvas = self.pending.remove(&token)?;
        Some((canvas, token))
    }

    fn run_frames(&mut self, manager: &mut SceneManager<RecordingTarget>, count: usize) {
        for _ in 0..count {
            let (_, token) = self.next_frame().expect("a pending frame");
            assert_eq!(manager.on_frame(self, token), TickOutcome::Rendered);
        }
    }

    fn count(&self, event: &TargetEvent) -> usize {
        self.log.borrow().iter().filter(|e| *e == event).count()
    }

    fn renders(&self) -> usize {
        self.count(&TargetEvent::Render)
    }

    fn saved_raw(&self) -> Option<String> {
        self.store
            .as_ref()
            .and_then(|store| store.get(&storage_key(CANVAS)).ok().flatten())
    }
}

impl Host for FakeHost {
    type Target = RecordingTarget;

    fn canvas(&self, id: &str) -> Option<CanvasInfo> {
        self.canvases.get(id).map(|size| CanvasInfo {
            id: id.to_string(),
            container_size: *size,
        })
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    fn create_render_target(
        &mut self,
        _canvas: &CanvasInfo,
        options: &TargetOptions,
    ) -> Result<RecordingTarget> {
        if self.fail_targets {
            bail!("no GPU adapter available");
        }
        assert!(options.antialias && options.alpha);
        Ok(RecordingTarget {
            log: self.log.clone(),
            size: (0, 0),
            pixel_ratio: 1.0,
        })
    }

    fn request_frame(&mut self, canvas_id: &str) -> FrameToken {
        let token = FrameToken(self.next_token);
        self.next_token += 1;
        self.frames_requested += 1;
        self.pending.insert(token, canvas_id.to_string());
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.pending.remove(&token);
    }

    fn subscribe_resize(&mut self, canvas_id: &str) {
        self.resize_listeners.push(canvas_id.to_string());
    }

    fn unsubscribe_resize(&mut self, canvas_id: &str) {
        self.resize_listeners.retain(|listener| listener != canvas_id);
    }

    fn store(&self) -> Option<&dyn StateStore> {
        self.store.as_ref().map(|store| store as &dyn StateStore)
    }

    fn store_mut(&mut self) -> Option<&mut dyn StateStore> {
        self.store.as_mut().map(|store| store as &mut dyn StateStore)
    }
}

fn manager_with(config: SceneConfig) -> SceneManager<RecordingTarget> {
    SceneManager::new(CANVAS, config)
}

fn cube_rotation(manager: &SceneManager<RecordingTarget>) -> DVec3 {
    manager
        .state()
        .summary()
        .cube_transform
        .expect("cube present")
        .rotation
}

#[test]
fn hundred_frames_rotate_by_one_radian() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).expect("init");

    let summary = manager.state().summary();
    assert!(summary.running);
    let transform = summary.cube_transform.unwrap();
    assert_eq!(transform.rotation, DVec3::ZERO);
    assert_eq!(transform.position, DVec3::new(0.0, 0.0, DEFAULT_Z_POSITION));

    host.run_frames(&mut manager, 100);
    let rotation = cube_rotation(&manager);
    assert!((rotation.x - 1.0).abs() < 1e-9);
    assert!((rotation.y - 1.0).abs() < 1e-9);
    assert_eq!(rotation.z, 0.0);
    assert_eq!(host.renders(), 100);
    assert_eq!(host.pending.len(), 1);
}

#[test]
fn resize_updates_camera_and_target_together() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).unwrap();
    assert_eq!(manager.state().summary().target_size, Some((800, 600)));

    host.canvases.insert(CANVAS.to_string(), (400, 300));
    manager.on_resize(&mut host);

    let camera = manager.state().get_state().camera.clone().unwrap();
    assert_eq!(camera.aspect(), 400.0 / 300.0);
    let expected = PerspectiveCamera::new(75.0, 400.0 / 300.0, 0.1, 1000.0);
    assert_eq!(camera.projection(), expected.projection());
    assert_eq!(manager.state().summary().target_size, Some((400, 300)));

    host.canvases.insert(CANVAS.to_string(), (1000, 250));
    manager.on_resize(&mut host);
    let camera = manager.state().get_state().camera.clone().unwrap();
    assert_eq!(camera.aspect(), 4.0);
    assert_eq!(manager.state().summary().target_size, Some((1000, 250)));
}

#[test]
fn missing_canvas_never_schedules_a_frame() {
    let mut host = FakeHost::without_canvas();
    let mut manager = manager_with(SceneConfig::default());

    let err = manager.init(&mut host).unwrap_err();
    assert!(matches!(err, SceneError::CanvasNotFound(ref id) if id == CANVAS));
    assert_eq!(host.frames_requested, 0);
    assert!(host.resize_listeners.is_empty());

    manager.cleanup(&mut host);
    manager.cleanup(&mut host);
    assert_eq!(host.frames_requested, 0);
    assert!(host.log.borrow().is_empty());
    assert!(!manager.is_running());
}

#[test]
fn target_failure_cleans_up_and_reports() {
    let mut host = FakeHost::new();
    host.fail_targets = true;
    let mut manager = manager_with(SceneConfig::default());

    let err = manager.init(&mut host).unwrap_err();
    assert!(matches!(err, SceneError::RenderTarget(_)));
    assert_eq!(host.frames_requested, 0);
    assert!(!manager.state().summary().has_target);
}

#[test]
fn invalid_config_is_rejected_before_touching_the_host() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig {
        camera_near: 5.0,
        camera_far: 1.0,
        ..Default::default()
    });
    assert!(matches!(
        manager.init(&mut host),
        Err(SceneError::InvalidConfig(_))
    ));
    assert!(host.log.borrow().is_empty());
}

#[test]
fn cleanup_is_idempotent_and_releases_everything_once() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).unwrap();
    host.run_frames(&mut manager, 3);

    manager.cleanup(&mut host);
    let after_first = manager.state().summary();
    let events_after_first = host.log.borrow().len();
    manager.cleanup(&mut host);
    let after_second = manager.state().summary();

    assert_eq!(after_first, after_second);
    assert!(!after_first.running);
    assert!(!after_first.has_target && !after_first.has_scene);
    assert!(!after_first.has_camera && !after_first.has_cube);
    assert_eq!(after_first.animation, LoopPhase::Idle);
    assert_eq!(host.log.borrow().len(), events_after_first);

    let log = host.log.borrow();
    let geometries = log
        .iter()
        .filter(|e| matches!(e, TargetEvent::GeometryReleased(_)))
        .count();
    let materials = log
        .iter()
        .filter(|e| matches!(e, TargetEvent::MaterialReleased(_)))
        .count();
    assert_eq!(geometries, 1);
    assert_eq!(materials, 1);
    drop(log);
    assert_eq!(host.count(&TargetEvent::Disposed), 1);
    assert_eq!(host.count(&TargetEvent::ContextLost), 1);
    assert!(host.pending.is_empty());
    assert!(host.resize_listeners.is_empty());
}

#[test]
fn in_flight_frame_after_cleanup_does_not_render() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).unwrap();

    let (_, token) = host.next_frame().unwrap();
    manager.cleanup(&mut host);
    assert_eq!(manager.on_frame(&mut host, token), TickOutcome::Stale);
    assert_eq!(host.renders(), 0);
}

#[test]
fn second_init_is_rejected_without_double_listeners() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).unwrap();
    assert!(matches!(
        manager.init(&mut host),
        Err(SceneError::AlreadyInitialized(_))
    ));
    assert_eq!(host.resize_listeners.len(), 1);
    assert_eq!(host.pending.len(), 1);
    assert!(manager.is_running());
}

#[test]
fn persists_on_cleanup_only_by_default() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).unwrap();
    host.run_frames(&mut manager, 5);
    assert_eq!(host.saved_raw(), None);

    manager.cleanup(&mut host);
    let raw = host.saved_raw().expect("state saved on cleanup");
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!((value["rotation"]["xAxisRotation"].as_f64().unwrap() - 0.05).abs() < 1e-12);
    assert_eq!(value["position"]["zCoordinate"], DEFAULT_Z_POSITION);
}

#[test]
fn persists_every_frame_when_configured() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig {
        persist_policy: PersistPolicy::EveryFrame,
        ..Default::default()
    });
    manager.init(&mut host).unwrap();
    host.run_frames(&mut manager, 3);

    let raw = host.saved_raw().expect("state saved each frame");
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!((value["rotation"]["yAxisRotation"].as_f64().unwrap() - 0.03).abs() < 1e-12);
}

#[test]
fn never_policy_does_not_write() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig {
        persist_policy: PersistPolicy::Never,
        ..Default::default()
    });
    manager.init(&mut host).unwrap();
    host.run_frames(&mut manager, 2);
    manager.cleanup(&mut host);
    assert_eq!(host.saved_raw(), None);
}

#[test]
fn storage_failures_do_not_block_rendering() {
    let mut host = FakeHost::new();
    host.store = Some(MemoryStore::with_quota(4));
    let mut manager = manager_with(SceneConfig {
        persist_policy: PersistPolicy::EveryFrame,
        ..Default::default()
    });
    manager.init(&mut host).unwrap();
    host.run_frames(&mut manager, 10);
    assert_eq!(host.renders(), 10);
    assert_eq!(host.saved_raw(), None);

    let mut host = FakeHost::new();
    host.store = None;
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).unwrap();
    host.run_frames(&mut manager, 2);
    manager.cleanup(&mut host);
    assert_eq!(host.renders(), 2);
}

#[test]
fn malformed_saved_state_falls_back_to_default_pose() {
    let mut host = FakeHost::new();
    host.store
        .as_mut()
        .unwrap()
        .set(&storage_key(CANVAS), "{\"rotation\": 12".to_string())
        .unwrap();
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).unwrap();
    let transform = manager.state().summary().cube_transform.unwrap();
    assert_eq!(transform.rotation, DVec3::ZERO);
    assert_eq!(transform.position.z, DEFAULT_Z_POSITION);
}

#[test]
fn pixel_ratio_is_capped_and_container_falls_back_to_viewport() {
    let mut host = FakeHost::new();
    host.device_pixel_ratio = 3.0;
    host.canvases.insert(CANVAS.to_string(), (0, 480));
    let mut manager = manager_with(SceneConfig::default());
    manager.init(&mut host).unwrap();

    assert_eq!(host.count(&TargetEvent::PixelRatio(2.0)), 1);
    assert_eq!(manager.state().summary().target_size, Some((1280, 480)));
}

#[test]
fn fixed_sizing_ignores_container_changes() {
    let mut host = FakeHost::new();
    let mut manager = manager_with(SceneConfig {
        sizing: Sizing::Fixed {
            width: 300,
            height: 300,
        },
        ..Default::default()
    });
    manager.init(&mut host).unwrap();
    assert_eq!(manager.state().summary().target_size, Some((300, 300)));

    host.canvases.insert(CANVAS.to_string(), (400, 100));
    manager.on_resize(&mut host);
    assert_eq!(manager.state().summary().target_size, Some((300, 300)));
    let camera = manager.state().get_state().camera.clone().unwrap();
    assert_eq!(camera.aspect(), 1.0);
}

#[test]
fn registry_restores_state_across_navigation() {
    let mut host = FakeHost::new();
    let mut registry = SceneRegistry::new(SceneConfig::default());

    registry
        .dispatch(
            &mut host,
            HostEvent::PageLoad {
                canvas_id: CANVAS.to_string(),
            },
        )
        .unwrap();
    for _ in 0..10 {
        let (canvas_id, token) = host.next_frame().unwrap();
        registry
            .dispatch(&mut host, HostEvent::Frame { canvas_id, token })
            .unwrap();
    }
    registry.dispatch(&mut host, HostEvent::BeforeSwap).unwrap();
    assert!(!registry.get(CANVAS).unwrap().is_running());
    assert!(host.pending.is_empty());

    registry.page_load(&mut host, CANVAS).unwrap();
    let manager = registry.get(CANVAS).unwrap();
    let transform = manager.state().summary().cube_transform.unwrap();
    assert!((transform.rotation.x - 0.1).abs() < 1e-12);
    assert!((transform.rotation.y - 0.1).abs() < 1e-12);
    assert_eq!(transform.rotation.z, 0.0);
    assert_eq!(transform.position, DVec3::new(0.0, 0.0, DEFAULT_Z_POSITION));
    assert_eq!(registry.len(), 1);
}

#[test]
fn registry_keeps_canvases_independent() {
    let mut host = FakeHost::new();
    host.canvases.insert("other".to_string(), (200, 100));
    let mut registry = SceneRegistry::new(SceneConfig::default());
    registry.page_load(&mut host, CANVAS).unwrap();
    registry.page_load(&mut host, "other").unwrap();
    assert!(registry.page_load(&mut host, "missing").is_err());
    assert_eq!(registry.len(), 3);

    let mut seen = BTreeSet::new();
    while let Some((canvas_id, token)) = host.next_frame() {
        if !seen.insert(canvas_id.clone()) {
            break;
        }
        registry
            .dispatch(&mut host, HostEvent::Frame { canvas_id, token })
            .unwrap();
    }
    assert!(seen.contains(CANVAS) && seen.contains("other"));
    assert!(!seen.contains("missing"));

    registry.dispatch(&mut host, HostEvent::Resize).unwrap();
    assert_eq!(
        registry.get("other").unwrap().state().summary().target_size,
        Some((200, 100))
    );

    registry.before_swap(&mut host);
    assert!(host.resize_listeners.is_empty());
    assert_eq!(host.count(&TargetEvent::ContextLost), 2);
}
