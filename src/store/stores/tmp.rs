//! `tmp` store: ephemeral in-memory collections.
//!
//! All data lives in process memory and is discarded when the process exits.
//! Used by tests and by `backend = "tmp"` for throwaway sessions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::table::CollectionData;
use crate::store::{Collection, RecordKey, Store, StoreError};

pub struct TmpStore {
    data: Mutex<HashMap<Collection, CollectionData>>,
}

impl TmpStore {
    pub fn new() -> Self {
        Self { data: Mutex::new(HashMap::new()) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Collection, CollectionData>>, StoreError> {
        self.data.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for TmpStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for TmpStore {
    fn store_type(&self) -> &str {
        "tmp"
    }

    fn get(&self, collection: Collection, key: &RecordKey) -> Result<Option<Value>, StoreError> {
        Ok(self.lock()?.get(&collection).and_then(|t| t.get(key)))
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .lock()?
            .get(&collection)
            .map(|t| t.records.clone())
            .unwrap_or_default())
    }

    fn put(&self, collection: Collection, record: Value) -> Result<RecordKey, StoreError> {
        self.lock()?.entry(collection).or_default().put(collection, record)
    }

    fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        if let Some(t) = self.lock()?.get_mut(&collection) {
            t.clear();
        }
        Ok(())
    }
}
