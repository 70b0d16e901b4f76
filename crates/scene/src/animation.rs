//! Frame-driven rotation loop.
//!
//! The loop is a two-state machine stored in [`crate::SceneState`]:
//! `Idle` (nothing scheduled) and `Running(token)` (one frame callback
//! pending). Every tick re-checks the running flag and the resources before
//! drawing, which also guards against callbacks that fire after a cancel.

use glam::DVec3;
use tracing::{trace, warn};

use crate::config::PersistPolicy;
use crate::host::{FrameToken, Host, RenderTarget};
use crate::persist::save_state;
use crate::state::{FrameParts, SceneStateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPhase {
    #[default]
    Idle,
    Running(FrameToken),
}

impl LoopPhase {
    pub fn pending(self) -> Option<FrameToken> {
        match self {
            LoopPhase::Idle => None,
            LoopPhase::Running(token) => Some(token),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was drawn and the next one scheduled.
    Rendered,
    /// The running flag was cleared or a resource is missing; the loop is idle.
    Stopped,
    /// The token does not match the pending frame and was ignored.
    Stale,
}

/// Adds `speed` to the x and y rotation; z is untouched and nothing wraps.
pub fn advance_rotation(rotation: DVec3, speed: f64) -> DVec3 {
    DVec3::new(rotation.x + speed, rotation.y + speed, rotation.z)
}

/// Drives the loop for one canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationDriver {
    speed: f64,
    persist: PersistPolicy,
}

impl AnimationDriver {
    pub fn new(speed: f64, persist: PersistPolicy) -> Self {
        Self { speed, persist }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Schedules the first frame. Does nothing unless the state is running
    /// and idle.
    pub fn start<H: Host>(
        &self,
        host: &mut H,
        canvas_id: &str,
        state: &mut SceneStateStore<H::Target>,
    ) -> bool {
        if !state.is_running() || state.animation() != LoopPhase::Idle {
            return false;
        }
        let token = host.request_frame(canvas_id);
        state.set_animation(LoopPhase::Running(token));
        trace!(canvas = canvas_id, ?token, "animation loop started");
        true
    }

    /// Handles a due frame callback.
    pub fn tick<H: Host>(
        &self,
        host: &mut H,
        canvas_id: &str,
        state: &mut SceneStateStore<H::Target>,
        token: FrameToken,
    ) -> TickOutcome {
        if state.animation() != LoopPhase::Running(token) {
            trace!(canvas = canvas_id, ?token, "ignoring stale frame callback");
            return TickOutcome::Stale;
        }
        state.set_animation(LoopPhase::Idle);

        if !state.is_running() {
            return TickOutcome::Stopped;
        }
        let Some(FrameParts {
            target,
            scene,
            camera,
            cube,
        }) = state.frame_parts()
        else {
            return TickOutcome::Stopped;
        };

        let Some(mesh) = scene.mesh_mut(cube) else {
            return TickOutcome::Stopped;
        };
        mesh.transform.rotation = advance_rotation(mesh.transform.rotation, self.speed);
        let transform = mesh.transform;

        if let Err(err) = target.render(scene, camera) {
            warn!(canvas = canvas_id, error = %format!("{err:#}"), "frame render failed");
        }

        if self.persist == PersistPolicy::EveryFrame {
            save_state(host.store_mut(), &transform, canvas_id);
        }

        let next = host.request_frame(canvas_id);
        state.set_animation(LoopPhase::Running(next));
        TickOutcome::Rendered
    }

    /// Cancels the pending frame, if any, and returns the loop to idle.
    pub fn cancel<H: Host>(&self, host: &mut H, state: &mut SceneStateStore<H::Target>) {
        if let Some(token) = state.animation().pending() {
            host.cancel_frame(token);
        }
        state.set_animation(LoopPhase::Idle);
    }
}
