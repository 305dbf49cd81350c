//! Best-effort local persistence.
//!
//! A [`KeyValueStore`] holds raw strings under string keys, the way a browser's
//! local storage does. [`LocalStorage`] layers JSON on top and never lets a
//! storage failure escape: reads fall back to the caller's default and writes
//! are logged and dropped. In-memory state is always the source of truth.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure of a storage backend. Never leaves [`LocalStorage`].
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Underlying I/O failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded.
    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key contains characters the backend cannot store.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Write would exceed the backend's capacity.
    #[error("storage quota exceeded writing {key:?} ({needed} bytes, limit {limit})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },
}

/// Raw string key-value backend.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read the value stored under `key`, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// JSON mirror over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct LocalStorage {
    store: Arc<dyn KeyValueStore>,
}

impl LocalStorage {
    /// Wrap a backend.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Storage backed by a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Load the value under `key`, or `default` if it is missing, unreadable
    /// or does not decode as `T`.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read from storage");
                return default;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding malformed stored value");
                default
            }
        }
    }

    /// Persist `value` under `key`.
    ///
    /// Returns whether the write went through; failures are only logged.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let result = serde_json::to_string(value)
            .map_err(PersistenceError::from)
            .and_then(|raw| self.store.set(key, &raw));

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to write to storage");
                false
            }
        }
    }
}
