//! [`StoreHandle`]: async-safe handle over a [`Store`] backend.
//!
//! All I/O is dispatched to the blocking thread pool so callers remain
//! non-blocking. Besides the four raw collection operations the handle offers
//! typed helpers for the records the chat core reads and writes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Collection, RecordKey, Store, StoreError};
use crate::llm::{InlineImage, Role};

/// Setting holding the credential list.
pub const API_KEYS: &str = "apiKeys";
/// Setting holding the rotation pointer.
pub const CURRENT_KEY_INDEX: &str = "currentKeyIndex";
/// Setting holding the chat model name.
pub const MODEL_NAME: &str = "modelName";

/// One entry of the append-only conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
    pub timestamp: DateTime<Utc>,
}

/// A remembered fact. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Cheaply cloneable (`Arc`-backed).
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn Store>,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store_type(&self) -> &str {
        self.store.store_type()
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }

    // ── Raw collection operations ─────────────────────────────────────

    pub async fn get(&self, collection: Collection, key: RecordKey) -> Result<Option<Value>, StoreError> {
        self.run(move |s| s.get(collection, &key)).await
    }

    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.run(move |s| s.get_all(collection)).await
    }

    pub async fn put(&self, collection: Collection, record: Value) -> Result<RecordKey, StoreError> {
        self.run(move |s| s.put(collection, record)).await
    }

    pub async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        self.run(move |s| s.clear(collection)).await
    }

    // ── Settings ──────────────────────────────────────────────────────

    /// Read `settings[key].value`, or `default` when the record is absent.
    pub async fn get_setting<T>(&self, key: &str, default: T) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        match self.get(Collection::Settings, key.into()).await? {
            Some(mut record) => match record.get_mut("value").map(Value::take) {
                Some(value) => decode(Collection::Settings, value),
                None => Ok(default),
            },
            None => Ok(default),
        }
    }

    pub async fn save_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::Malformed {
            collection: Collection::Settings.name(),
            detail: e.to_string(),
        })?;
        self.put(Collection::Settings, json!({ "id": key, "value": value })).await?;
        Ok(())
    }

    // ── Messages ──────────────────────────────────────────────────────

    /// The full conversation log, oldest first.
    pub async fn messages(&self) -> Result<Vec<StoredMessage>, StoreError> {
        let mut messages: Vec<StoredMessage> = self
            .get_all(Collection::Messages)
            .await?
            .into_iter()
            .map(|r| decode(Collection::Messages, r))
            .collect::<Result<_, _>>()?;
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    /// Append a message stamped with the current time.
    pub async fn save_message(
        &self,
        role: Role,
        text: Option<String>,
        image: Option<InlineImage>,
    ) -> Result<StoredMessage, StoreError> {
        let mut message = StoredMessage { id: None, role, text, image, timestamp: Utc::now() };
        let key = self.put(Collection::Messages, encode(Collection::Messages, &message)?).await?;
        message.id = int_key(key);
        Ok(message)
    }

    pub async fn clear_messages(&self) -> Result<(), StoreError> {
        self.clear(Collection::Messages).await
    }

    // ── Memory ────────────────────────────────────────────────────────

    pub async fn save_memory(&self, text: &str) -> Result<MemoryItem, StoreError> {
        let mut item = MemoryItem { id: None, text: text.to_string(), timestamp: Utc::now() };
        let key = self.put(Collection::Memory, encode(Collection::Memory, &item)?).await?;
        item.id = int_key(key);
        Ok(item)
    }

    pub async fn all_memory(&self) -> Result<Vec<MemoryItem>, StoreError> {
        self.get_all(Collection::Memory)
            .await?
            .into_iter()
            .map(|r| decode(Collection::Memory, r))
            .collect()
    }

    pub async fn clear_memory(&self) -> Result<(), StoreError> {
        self.clear(Collection::Memory).await
    }
}

fn decode<T: DeserializeOwned>(collection: Collection, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Malformed {
        collection: collection.name(),
        detail: e.to_string(),
    })
}

fn encode<T: Serialize>(collection: Collection, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Malformed {
        collection: collection.name(),
        detail: e.to_string(),
    })
}

fn int_key(key: RecordKey) -> Option<u64> {
    match key {
        RecordKey::Int(n) => Some(n),
        RecordKey::Name(_) => None,
    }
}
