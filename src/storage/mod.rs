//! Key-value persistence collaborator.
//!
//! Abstracts the local store so different backends can be swapped without
//! touching subsystem code:
//! - `MemoryStore`: in-memory store for testing and minimal deployments
//! - `SledStore`: best-effort durable local store
//!
//! All reads are best-effort: absent or malformed data falls back to
//! defaults and is never fatal.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::warn;

/// Storage keys for each persisted value.
pub mod keys {
    pub const CONTACTS: &str = "safety_app_contacts";
    pub const GROUPS: &str = "safety_app_groups";
    pub const AI_SETTINGS: &str = "safety_app_ai_settings";
    pub const FAKE_CALL_SETTINGS: &str = "safety_app_fake_call_settings";
    pub const SHARING_STATE: &str = "safety_app_sharing_state";
    pub const SAFETY_ZONES: &str = "safety_app_safety_zones";
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("store error: {0}")]
    Backend(String),
}

/// Trait for pluggable key-value backends.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when absent or unreadable.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value. Best effort: failures are reported but callers
    /// treat them as non-fatal.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}

// ============================================================================
// JSON helpers
// ============================================================================

/// Load and deserialize a JSON value from the store.
///
/// Absent keys and malformed payloads both fall back to `T::default()`;
/// malformed data is logged and replaced, never propagated.
pub fn load_json<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    match store.get(key) {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Malformed persisted data — using default");
                T::default()
            }
        },
        None => T::default(),
    }
}

/// Serialize and store a JSON value. Failures are logged, not propagated.
pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => {
            if let Err(e) = store.set(key, &raw) {
                warn!(key, error = %e, "Failed to persist value");
            }
        }
        Err(e) => warn!(key, error = %e, "Failed to serialize value"),
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory store for testing and minimal deployments.
///
/// Thread-safe via `RwLock`. Not durable — data lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.read() {
            Ok(map) => map.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self
            .values
            .write()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

// ============================================================================
// Sled backend
// ============================================================================

/// Local durable store backed by sled.
///
/// Does not flush on each write; sled provides durability via background
/// flushing. On crash the last few writes may be lost, which matches the
/// best-effort persistence contract.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open or create the store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.db.get(key) {
            Ok(Some(raw)) => match String::from_utf8(raw.to_vec()) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(key, error = %e, "Non-UTF8 value in store — ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Store read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.db
            .insert(key, value.as_bytes())
            .map(|_| ())
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("missing").is_none());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_load_json_absent_defaults() {
        let store = MemoryStore::new();
        let s: Sample = load_json(&store, "nope");
        assert_eq!(s, Sample::default());
    }

    #[test]
    fn test_load_json_malformed_defaults() {
        let store = MemoryStore::new();
        store.set("bad", "{not json").unwrap();
        let s: Sample = load_json(&store, "bad");
        assert_eq!(s, Sample::default());
    }

    #[test]
    fn test_save_then_load_json() {
        let store = MemoryStore::new();
        save_json(&store, "s", &Sample { n: 7 });
        let s: Sample = load_json(&store, "s");
        assert_eq!(s.n, 7);
    }

    #[test]
    fn test_sled_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.backend_name(), "Sled");
    }

    #[test]
    fn test_trait_object() {
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
    }
}
