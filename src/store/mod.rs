//! Persistent key-value state shared with the popup layer.
//!
//! The capture core writes full snapshots of individual fields; readers see
//! last-write-wins state. Keys are the wire names the popup layer expects.

pub mod bridge;
pub mod sqlite;

use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage keys written by the capture core.
pub mod keys {
    pub const TRANSCRIPT: &str = "transcript";
    pub const CHAT_MESSAGES: &str = "chatMessages";
    pub const MEETING_TITLE: &str = "meetingTitle";
    pub const MEETING_START_TIMESTAMP: &str = "meetingStartTimestamp";
    /// Status record gating whether capture runs at all.
    pub const CAPTURE_STATUS: &str = "captureStatus";
}

/// Get/set key-value store over JSON values. `set` overwrites exactly the
/// keys present in the object and leaves every other key untouched.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;
    fn set(&self, entries: Map<String, Value>) -> Result<()>;
}

/// In-memory store for tests and replays.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let values = self.values.lock().unwrap();
        let mut result = Map::new();
        for &key in keys {
            if let Some(value) = values.get(key) {
                result.insert(key.to_string(), value.clone());
            }
        }
        Ok(result)
    }

    fn set(&self, entries: Map<String, Value>) -> Result<()> {
        let mut values = self.values.lock().unwrap();
        for (key, value) in entries {
            values.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_overwrites_only_named_keys() {
        let store = MemoryStore::new();
        let mut first = Map::new();
        first.insert(keys::MEETING_TITLE.to_string(), json!("Standup"));
        first.insert(keys::TRANSCRIPT.to_string(), json!([]));
        store.set(first).unwrap();

        let mut second = Map::new();
        second.insert(keys::MEETING_TITLE.to_string(), json!("Planning"));
        store.set(second).unwrap();

        let result = store
            .get(&[keys::MEETING_TITLE, keys::TRANSCRIPT])
            .unwrap();
        assert_eq!(result[keys::MEETING_TITLE], json!("Planning"));
        assert_eq!(result[keys::TRANSCRIPT], json!([]));
    }

    #[test]
    fn test_get_missing_key_is_absent() {
        let store = MemoryStore::new();
        let result = store.get(&["nothing"]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_idempotent_rewrite() {
        let store = MemoryStore::new();
        let mut entries = Map::new();
        entries.insert(keys::TRANSCRIPT.to_string(), json!([{"personName": "A"}]));
        store.set(entries.clone()).unwrap();
        store.set(entries).unwrap();

        let result = store.get(&[keys::TRANSCRIPT]).unwrap();
        assert_eq!(result[keys::TRANSCRIPT].as_array().unwrap().len(), 1);
    }
}
