use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::animation::TickOutcome;
use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::host::{Host, HostEvent, RenderTarget};
use crate::manager::SceneManager;

/// Active scenes keyed by canvas id, driven by page lifecycle events.
///
/// Before the page is swapped every scene is cleaned up; after a page loads a
/// fresh manager is created and initialised for the canvas it shows.
#[derive(Debug)]
pub struct SceneRegistry<T> {
    config: SceneConfig,
    managers: BTreeMap<String, SceneManager<T>>,
}

impl<T: RenderTarget> SceneRegistry<T> {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            config,
            managers: BTreeMap::new(),
        }
    }

    pub fn get(&self, canvas_id: &str) -> Option<&SceneManager<T>> {
        self.managers.get(canvas_id)
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Cleans up every registered scene.
    pub fn before_swap<H: Host<Target = T>>(&mut self, host: &mut H) {
        debug!(scenes = self.managers.len(), "page swap: cleaning up scenes");
        for manager in self.managers.values_mut() {
            manager.cleanup(host);
        }
    }

    /// Replaces the scene for `canvas_id` with a fresh one and initialises it.
    pub fn page_load<H: Host<Target = T>>(
        &mut self,
        host: &mut H,
        canvas_id: &str,
    ) -> Result<(), SceneError> {
        if let Some(mut previous) = self.managers.remove(canvas_id) {
            previous.cleanup(host);
        }
        let mut manager = SceneManager::new(canvas_id, self.config.clone());
        let result = manager.init(host);
        self.managers.insert(canvas_id.to_string(), manager);
        result
    }

    /// Routes one host event.
    pub fn dispatch<H: Host<Target = T>>(
        &mut self,
        host: &mut H,
        event: HostEvent,
    ) -> Result<(), SceneError> {
        match event {
            HostEvent::Frame { canvas_id, token } => {
                match self.managers.get_mut(&canvas_id) {
                    Some(manager) => {
                        if manager.on_frame(host, token) == TickOutcome::Stopped {
                            debug!(canvas = %canvas_id, "animation loop stopped");
                        }
                    }
                    None => trace!(canvas = %canvas_id, "frame for unknown canvas dropped"),
                }
                Ok(())
            }
            HostEvent::Resize => {
                for manager in self.managers.values_mut() {
                    manager.on_resize(host);
                }
                Ok(())
            }
            HostEvent::BeforeSwap => {
                self.before_swap(host);
                Ok(())
            }
            HostEvent::PageLoad { canvas_id } => self.page_load(host, &canvas_id),
        }
    }
}
