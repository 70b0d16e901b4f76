//! Save and restore of the cube transform through a key-value string store.
//!
//! Storage is best-effort: every failure is logged at warn level and the
//! caller carries on with defaults.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::graph::Transform;

const STORAGE_KEY_PREFIX: &str = "cube-state-";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded: {requested} bytes requested, {available} available")]
    QuotaExceeded { requested: usize, available: usize },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Minimal string key-value storage, shaped after browser local storage.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
}

/// In-memory store with an optional byte quota over keys plus values.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(existing, value)| existing.len() + value.len())
            .sum()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            let available = quota.saturating_sub(self.used_bytes_without(key));
            let requested = key.len() + value.len();
            if requested > available {
                return Err(StoreError::QuotaExceeded {
                    requested,
                    available,
                });
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRotation {
    pub x_axis_rotation: f64,
    pub y_axis_rotation: f64,
    pub z_axis_rotation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPosition {
    pub x_coordinate: f64,
    pub y_coordinate: f64,
    pub z_coordinate: f64,
}

/// Persisted snapshot of one cube transform; either group may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<SavedRotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SavedPosition>,
}

impl SavedState {
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            rotation: Some(SavedRotation {
                x_axis_rotation: transform.rotation.x,
                y_axis_rotation: transform.rotation.y,
                z_axis_rotation: transform.rotation.z,
            }),
            position: Some(SavedPosition {
                x_coordinate: transform.position.x,
                y_coordinate: transform.position.y,
                z_coordinate: transform.position.z,
            }),
        }
    }

    pub fn rotation_vec(&self) -> Option<DVec3> {
        self.rotation.map(|rotation| {
            DVec3::new(
                rotation.x_axis_rotation,
                rotation.y_axis_rotation,
                rotation.z_axis_rotation,
            )
        })
    }

    pub fn position_vec(&self) -> Option<DVec3> {
        self.position.map(|position| {
            DVec3::new(
                position.x_coordinate,
                position.y_coordinate,
                position.z_coordinate,
            )
        })
    }
}

/// Namespaced storage key for a canvas.
pub fn storage_key(canvas_id: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{canvas_id}")
}

/// Reads the saved transform for `canvas_id`, or `None` when there is none
/// or it cannot be read.
pub fn load_saved_state(store: Option<&dyn StateStore>, canvas_id: &str) -> Option<SavedState> {
    let Some(store) = store else {
        warn!(canvas = canvas_id, "storage unavailable; starting from default pose");
        return None;
    };
    let key = storage_key(canvas_id);
    let raw = match store.get(&key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(canvas = canvas_id, %key, error = %err, "error loading saved state");
            return None;
        }
    };
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<SavedState>(&raw) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!(canvas = canvas_id, %key, error = %err, "ignoring malformed saved state");
            None
        }
    }
}

/// Writes `transform` for `canvas_id`. Failures are logged, never returned.
pub fn save_state(store: Option<&mut dyn StateStore>, transform: &Transform, canvas_id: &str) {
    let Some(store) = store else {
        warn!(canvas = canvas_id, "storage unavailable; cube state not saved");
        return;
    };
    let key = storage_key(canvas_id);
    let serialized = match serde_json::to_string(&SavedState::from_transform(transform)) {
        Ok(serialized) => serialized,
        Err(err) => {
            warn!(canvas = canvas_id, error = %err, "failed to serialize cube state");
            return;
        }
    };
    if let Err(err) = store.set(&key, serialized) {
        warn!(canvas = canvas_id, %key, error = %err, "error saving state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(rotation: [f64; 3], position: [f64; 3]) -> Transform {
        Transform {
            rotation: DVec3::from_array(rotation),
            position: DVec3::from_array(position),
        }
    }

    #[test]
    fn key_is_namespaced() {
        assert_eq!(storage_key("three-js-canvas"), "cube-state-three-js-canvas");
    }

    #[test]
    fn round_trips_bit_for_bit() {
        let mut store = MemoryStore::new();
        let original = transform(
            [0.1 + 0.2, std::f64::consts::PI * 1e7, -1.0e-300],
            [f64::MAX, -0.0, 1.0 / 3.0],
        );
        save_state(Some(&mut store), &original, "X");
        let loaded = load_saved_state(Some(&store), "X").expect("saved state");

        let rotation = loaded.rotation_vec().unwrap();
        let position = loaded.position_vec().unwrap();
        for (got, want) in rotation
            .to_array()
            .iter()
            .chain(position.to_array().iter())
            .zip(
                original
                    .rotation
                    .to_array()
                    .iter()
                    .chain(original.position.to_array().iter()),
            )
        {
            assert_eq!(got.to_bits(), want.to_bits());
        }
    }

    #[test]
    fn missing_key_is_absent() {
        let store = MemoryStore::new();
        assert_eq!(load_saved_state(Some(&store), "X"), None);
    }

    #[test]
    fn malformed_content_is_absent() {
        let mut store = MemoryStore::new();
        store
            .set(&storage_key("X"), "{not json".to_string())
            .unwrap();
        assert_eq!(load_saved_state(Some(&store), "X"), None);

        store.set(&storage_key("X"), "null".to_string()).unwrap();
        assert_eq!(load_saved_state(Some(&store), "X"), None);
    }

    #[test]
    fn unavailable_storage_is_absent_and_save_is_silent() {
        assert_eq!(load_saved_state(None, "X"), None);
        save_state(None, &Transform::default(), "X");
    }

    #[test]
    fn reads_partial_groups() {
        let mut store = MemoryStore::new();
        store
            .set(
                &storage_key("X"),
                r#"{"rotation":{"xAxisRotation":1.0,"yAxisRotation":2.0,"zAxisRotation":3.0}}"#
                    .to_string(),
            )
            .unwrap();
        let loaded = load_saved_state(Some(&store), "X").unwrap();
        assert_eq!(loaded.rotation_vec(), Some(DVec3::new(1.0, 2.0, 3.0)));
        assert_eq!(loaded.position, None);
    }

    #[test]
    fn writes_the_documented_shape() {
        let mut store = MemoryStore::new();
        save_state(
            Some(&mut store),
            &transform([1.0, 2.0, 3.0], [4.0, 5.0, 6.0]),
            "X",
        );
        let raw = store.get(&storage_key("X")).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["rotation"]["yAxisRotation"], 2.0);
        assert_eq!(value["position"]["zCoordinate"], 6.0);
    }

    #[test]
    fn quota_failure_is_swallowed() {
        let mut store = MemoryStore::with_quota(8);
        save_state(Some(&mut store), &Transform::default(), "X");
        assert!(store.is_empty());
        assert!(matches!(
            store.set("key", "a long value".to_string()),
            Err(StoreError::QuotaExceeded { .. })
        ));
    }
}
