//! Persistent store: three named collections of JSON records.
//!
//! Backends implement the synchronous [`Store`] trait and live behind an
//! [`StoreHandle`], which dispatches every call through
//! `tokio::task::spawn_blocking` so async callers never block on file or
//! database I/O.
//!
//! Records are JSON objects carrying an `id` field. `put` is an upsert keyed
//! by that field; `messages` and `memory` assign the next integer id when a
//! record arrives without one.

pub mod handle;
pub mod stores;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};

pub use handle::{MemoryItem, StoredMessage, StoreHandle};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {detail}")]
    Io { path: String, detail: String },
    #[error("malformed record in '{collection}': {detail}")]
    Malformed { collection: &'static str, detail: String },
    #[error("record for '{0}' has no id")]
    MissingKey(&'static str),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store task join error: {0}")]
    Join(String),
    #[error("store lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Settings,
    Messages,
    Memory,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Settings, Collection::Messages, Collection::Memory];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Settings => "settings",
            Collection::Messages => "messages",
            Collection::Memory => "memory",
        }
    }

    /// Whether `put` assigns an integer id to records that lack one.
    pub fn auto_increment(&self) -> bool {
        !matches!(self, Collection::Settings)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a record within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(u64),
    Name(String),
}

impl RecordKey {
    /// Read the `id` field of a record, if it is a usable key.
    pub fn of(record: &Value) -> Option<RecordKey> {
        match record.get("id")? {
            Value::Number(n) => n.as_u64().map(RecordKey::Int),
            Value::String(s) => Some(RecordKey::Name(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Int(n) => Value::from(*n),
            RecordKey::Name(s) => Value::from(s.as_str()),
        }
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey::Name(s.to_string())
    }
}

impl From<u64> for RecordKey {
    fn from(n: u64) -> Self {
        RecordKey::Int(n)
    }
}

/// Pluggable persistent store.
///
/// Stores are `Send + Sync` and perform blocking I/O; [`StoreHandle`] wraps
/// these calls in `spawn_blocking`.
pub trait Store: Send + Sync {
    /// Unique type name for this store (e.g. `"json"`).
    fn store_type(&self) -> &str;

    fn get(&self, collection: Collection, key: &RecordKey) -> Result<Option<Value>, StoreError>;

    /// All records in insertion order.
    fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    /// Upsert `record`; returns the key it was stored under.
    fn put(&self, collection: Collection, record: Value) -> Result<RecordKey, StoreError>;

    fn clear(&self, collection: Collection) -> Result<(), StoreError>;
}

/// Open the configured backend.
pub fn open(config: &StoreConfig) -> Result<StoreHandle, StoreError> {
    let store: Arc<dyn Store> = match config.backend {
        StoreBackend::Tmp => Arc::new(stores::tmp::TmpStore::new()),
        StoreBackend::Json => Arc::new(stores::json_file::JsonFileStore::open(&config.dir)?),
        #[cfg(feature = "isqlite")]
        StoreBackend::Sqlite => {
            Arc::new(stores::sqlite::SqliteStore::open(&config.dir.join("smriti.db"))?)
        }
        #[cfg(not(feature = "isqlite"))]
        StoreBackend::Sqlite => {
            return Err(StoreError::Backend(
                "sqlite backend requires the 'isqlite' feature".into(),
            ));
        }
    };
    info!(backend = store.store_type(), dir = %config.dir.display(), "store opened");
    Ok(StoreHandle::new(store))
}
