//! `json` store: one `<collection>.json` file per collection.
//!
//! Each file holds a [`CollectionData`] (`{"next_id": …, "records": […]}`).
//! Writes go to a sibling `.tmp` file first and are renamed into place, so a
//! crash mid-write leaves the previous contents intact. A process-local mutex
//! serialises read-modify-write cycles.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use super::table::CollectionData;
use crate::store::{Collection, RecordKey, Store, StoreError};

pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        Ok(Self { dir: dir.to_path_buf(), write_lock: Mutex::new(()) })
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.name()))
    }

    fn load(&self, collection: Collection) -> Result<CollectionData, StoreError> {
        let path = self.path_for(collection);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CollectionData::default()),
            Err(e) => return Err(io_err(&path, e)),
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::Malformed {
            collection: collection.name(),
            detail: format!("{}: {e}", path.display()),
        })
    }

    fn save(&self, collection: Collection, data: &CollectionData) -> Result<(), StoreError> {
        let path = self.path_for(collection);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(data).map_err(|e| StoreError::Malformed {
            collection: collection.name(),
            detail: e.to_string(),
        })?;
        fs::write(&tmp, body).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        debug!(collection = collection.name(), records = data.records.len(), "collection saved");
        Ok(())
    }

    fn modify<T>(
        &self,
        collection: Collection,
        f: impl FnOnce(&mut CollectionData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut data = self.load(collection)?;
        let out = f(&mut data)?;
        self.save(collection, &data)?;
        Ok(out)
    }
}

fn io_err(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io { path: path.display().to_string(), detail: e.to_string() }
}

impl Store for JsonFileStore {
    fn store_type(&self) -> &str {
        "json"
    }

    fn get(&self, collection: Collection, key: &RecordKey) -> Result<Option<Value>, StoreError> {
        Ok(self.load(collection)?.get(key))
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        Ok(self.load(collection)?.records)
    }

    fn put(&self, collection: Collection, record: Value) -> Result<RecordKey, StoreError> {
        self.modify(collection, |data| data.put(collection, record))
    }

    fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        self.modify(collection, |data| {
            data.clear();
            Ok(())
        })
    }
}
