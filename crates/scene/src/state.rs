use tracing::warn;

use crate::animation::LoopPhase;
use crate::camera::PerspectiveCamera;
use crate::graph::{NodeId, SceneGraph, Transform};
use crate::host::RenderTarget;

/// Live resources of one managed canvas.
#[derive(Debug)]
pub struct SceneState<T> {
    pub target: Option<T>,
    pub scene: Option<SceneGraph>,
    pub camera: Option<PerspectiveCamera>,
    pub cube: Option<NodeId>,
    pub running: bool,
    /// Pending frame callback, if any.
    pub animation: LoopPhase,
}

impl<T> Default for SceneState<T> {
    fn default() -> Self {
        Self {
            target: None,
            scene: None,
            camera: None,
            cube: None,
            running: false,
            animation: LoopPhase::Idle,
        }
    }
}

impl<T> SceneState<T> {
    /// True when every resource a frame needs is present.
    pub fn is_complete(&self) -> bool {
        self.target.is_some()
            && self.camera.is_some()
            && self
                .scene
                .as_ref()
                .zip(self.cube)
                .is_some_and(|(scene, cube)| scene.mesh(cube).is_some())
    }

    pub fn cube_transform(&self) -> Option<Transform> {
        let scene = self.scene.as_ref()?;
        scene.mesh(self.cube?).map(|mesh| mesh.transform)
    }
}

/// Shallow update; `Some` fields replace the current values.
#[derive(Debug)]
pub struct SceneStateUpdate<T> {
    pub target: Option<T>,
    pub scene: Option<SceneGraph>,
    pub camera: Option<PerspectiveCamera>,
    pub cube: Option<NodeId>,
    pub running: Option<bool>,
    pub animation: Option<LoopPhase>,
}

impl<T> Default for SceneStateUpdate<T> {
    fn default() -> Self {
        Self {
            target: None,
            scene: None,
            camera: None,
            cube: None,
            running: None,
            animation: None,
        }
    }
}

/// Copyable view of the state, used for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSummary {
    pub has_target: bool,
    pub has_scene: bool,
    pub has_camera: bool,
    pub has_cube: bool,
    pub running: bool,
    pub animation: LoopPhase,
    pub target_size: Option<(u32, u32)>,
    pub cube_transform: Option<Transform>,
}

/// Borrowed resources needed to draw one frame.
pub struct FrameParts<'a, T> {
    pub target: &'a mut T,
    pub scene: &'a mut SceneGraph,
    pub camera: &'a PerspectiveCamera,
    pub cube: NodeId,
}

/// Owner of the live resource set, exposing controlled get/set access.
#[derive(Debug)]
pub struct SceneStateStore<T> {
    state: SceneState<T>,
}

impl<T> Default for SceneStateStore<T> {
    fn default() -> Self {
        Self {
            state: SceneState::default(),
        }
    }
}

impl<T: RenderTarget> SceneStateStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_state(&self) -> &SceneState<T> {
        &self.state
    }

    /// Merges `update` into the live state.
    ///
    /// A request to set `running` while a resource is missing is refused and
    /// leaves the flag cleared.
    pub fn set_state(&mut self, update: SceneStateUpdate<T>) {
        let SceneStateUpdate {
            target,
            scene,
            camera,
            cube,
            running,
            animation,
        } = update;

        if let Some(target) = target {
            self.state.target = Some(target);
        }
        if let Some(scene) = scene {
            self.state.scene = Some(scene);
        }
        if let Some(camera) = camera {
            self.state.camera = Some(camera);
        }
        if let Some(cube) = cube {
            self.state.cube = Some(cube);
        }
        if let Some(animation) = animation {
            self.state.animation = animation;
        }
        if let Some(running) = running {
            if running && !self.state.is_complete() {
                warn!("refusing to mark scene running with missing resources");
                self.state.running = false;
            } else {
                self.state.running = running;
            }
        }
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            has_target: self.state.target.is_some(),
            has_scene: self.state.scene.is_some(),
            has_camera: self.state.camera.is_some(),
            has_cube: self.state.cube.is_some(),
            running: self.state.running,
            animation: self.state.animation,
            target_size: self.state.target.as_ref().map(RenderTarget::size),
            cube_transform: self.state.cube_transform(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn animation(&self) -> LoopPhase {
        self.state.animation
    }

    pub(crate) fn set_animation(&mut self, phase: LoopPhase) {
        self.state.animation = phase;
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.set_state(SceneStateUpdate {
            running: Some(running),
            ..Default::default()
        });
    }

    /// Resources for one frame, or `None` if anything is missing.
    pub fn frame_parts(&mut self) -> Option<FrameParts<'_, T>> {
        let SceneState {
            target,
            scene,
            camera,
            cube,
            ..
        } = &mut self.state;
        let cube = (*cube)?;
        let scene = scene.as_mut()?;
        scene.mesh(cube)?;
        Some(FrameParts {
            target: target.as_mut()?,
            scene,
            camera: camera.as_ref()?,
            cube,
        })
    }

    /// Target and camera together, for resize handling.
    pub fn viewport_mut(&mut self) -> Option<(&mut T, &mut PerspectiveCamera)> {
        let SceneState { target, camera, .. } = &mut self.state;
        Some((target.as_mut()?, camera.as_mut()?))
    }

    /// Removes every resource and returns them, leaving the initial state.
    pub fn take_all(&mut self) -> SceneState<T> {
        std::mem::take(&mut self.state)
    }
}
