use tracing::{debug, error, info, warn};

use crate::animation::{AnimationDriver, TickOutcome};
use crate::config::{PersistPolicy, SceneConfig};
use crate::error::SceneError;
use crate::factory::{create_cube, setup_lights};
use crate::graph::{dispose_resources, SceneGraph, SceneNode};
use crate::host::{FrameToken, Host, RenderTarget};
use crate::persist::{load_saved_state, save_state};
use crate::setup::{
    aspect_ratio, effective_pixel_ratio, init_camera, init_renderer, resolve_surface_size,
};
use crate::state::{SceneStateStore, SceneStateUpdate};

/// Owns the scene of one canvas and exposes its `init`/`cleanup` entry points.
///
/// `init` is not idempotent on success: a second call on a live manager is
/// rejected with [`SceneError::AlreadyInitialized`] rather than registering a
/// second resize listener. `cleanup` may be called any number of times,
/// including after a failed `init`.
#[derive(Debug)]
pub struct SceneManager<T> {
    canvas_id: String,
    config: SceneConfig,
    driver: AnimationDriver,
    state: SceneStateStore<T>,
    resize_subscribed: bool,
}

impl<T: RenderTarget> SceneManager<T> {
    pub fn new(canvas_id: impl Into<String>, config: SceneConfig) -> Self {
        let driver = AnimationDriver::new(config.rotation_speed, config.persist_policy);
        Self {
            canvas_id: canvas_id.into(),
            config,
            driver,
            state: SceneStateStore::new(),
            resize_subscribed: false,
        }
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn state(&self) -> &SceneStateStore<T> {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Builds the scene and starts the loop.
    ///
    /// On failure the error is logged, partial state is torn down, and the
    /// error is returned; nothing is retried.
    pub fn init<H: Host<Target = T>>(&mut self, host: &mut H) -> Result<(), SceneError> {
        if self.state.get_state().target.is_some() || self.resize_subscribed {
            warn!(canvas = %self.canvas_id, "init called on a live scene; ignoring");
            return Err(SceneError::AlreadyInitialized(self.canvas_id.clone()));
        }

        match self.try_init(host) {
            Ok(()) => {
                info!(canvas = %self.canvas_id, "scene initialised");
                Ok(())
            }
            Err(err) => {
                error!(canvas = %self.canvas_id, error = %err, "failed to initialize scene");
                self.cleanup(host);
                Err(err)
            }
        }
    }

    fn try_init<H: Host<Target = T>>(&mut self, host: &mut H) -> Result<(), SceneError> {
        self.config.validate()?;
        if host.canvas(&self.canvas_id).is_none() {
            return Err(SceneError::CanvasNotFound(self.canvas_id.clone()));
        }

        let target = init_renderer(host, &self.canvas_id, &self.config)
            .ok_or_else(|| SceneError::RenderTarget(self.canvas_id.clone()))?;
        let aspect = aspect_ratio(target.size());
        self.state.set_state(SceneStateUpdate {
            target: Some(target),
            ..Default::default()
        });

        let mut scene = SceneGraph::new();
        let camera = init_camera(&self.config, aspect);
        let saved = load_saved_state(host.store(), &self.canvas_id);
        debug!(canvas = %self.canvas_id, restored = saved.is_some(), "creating cube");
        let cube = scene.add(SceneNode::mesh(
            "cube",
            create_cube(&self.config, saved.as_ref()),
        ));
        for light in setup_lights(&self.config) {
            scene.add(SceneNode::light(light));
        }

        self.state.set_state(SceneStateUpdate {
            scene: Some(scene),
            camera: Some(camera),
            cube: Some(cube),
            running: Some(true),
            ..Default::default()
        });

        self.driver.start(host, &self.canvas_id, &mut self.state);
        host.subscribe_resize(&self.canvas_id);
        self.resize_subscribed = true;
        Ok(())
    }

    /// Stops the loop and releases every resource. Safe to call repeatedly.
    pub fn cleanup<H: Host<Target = T>>(&mut self, host: &mut H) {
        self.state.set_running(false);
        self.driver.cancel(host, &mut self.state);

        if self.config.persist_policy == PersistPolicy::OnCleanup {
            if let Some(transform) = self.state.get_state().cube_transform() {
                save_state(host.store_mut(), &transform, &self.canvas_id);
            }
        }

        if self.resize_subscribed {
            host.unsubscribe_resize(&self.canvas_id);
            self.resize_subscribed = false;
        }

        let mut previous = self.state.take_all();
        if let Some(scene) = previous.scene.as_ref() {
            let report = dispose_resources(scene, previous.target.as_mut());
            debug!(
                canvas = %self.canvas_id,
                geometries = report.geometries,
                materials = report.materials,
                "released scene resources"
            );
        }
        if let Some(mut target) = previous.target.take() {
            target.dispose();
            target.force_context_loss();
            debug!(canvas = %self.canvas_id, "render target released");
        }
    }

    /// Forwards a due frame callback to the animation loop.
    pub fn on_frame<H: Host<Target = T>>(
        &mut self,
        host: &mut H,
        token: FrameToken,
    ) -> TickOutcome {
        self.driver.tick(host, &self.canvas_id, &mut self.state, token)
    }

    /// Re-derives output size, pixel ratio, and camera projection.
    pub fn on_resize<H: Host<Target = T>>(&mut self, host: &mut H) {
        if !self.resize_subscribed {
            return;
        }
        let Some(canvas) = host.canvas(&self.canvas_id) else {
            return;
        };
        let size = resolve_surface_size(&*host, &canvas, self.config.sizing);
        let pixel_ratio =
            effective_pixel_ratio(host.device_pixel_ratio(), self.config.pixel_ratio_cap);
        let Some((target, camera)) = self.state.viewport_mut() else {
            return;
        };
        camera.set_aspect(aspect_ratio(size));
        target.set_pixel_ratio(pixel_ratio);
        target.set_size(size.0, size.1);
        debug!(canvas = %self.canvas_id, width = size.0, height = size.1, "scene resized");
    }
}
