//! `sqlite` store: all collections in one SQLite database.
//!
//! Records are kept as JSON text keyed by `(collection, id)`; the id is the
//! JSON encoding of the [`RecordKey`] so integer and string keys never collide.
//! Upserts keep the original rowid, which preserves insertion order for
//! `get_all`. Each operation opens its own connection.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use super::table::assign_key;
use crate::store::{Collection, RecordKey, Store, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    body       TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE TABLE IF NOT EXISTS counters (
    collection TEXT PRIMARY KEY,
    next_id    INTEGER NOT NULL
);
";

pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.display().to_string(),
                detail: e.to_string(),
            })?;
        }
        let store = Self { db_path: db_path.to_path_buf() };
        store
            .open_conn()?
            .execute_batch(SCHEMA)
            .map_err(|e| backend("create schema", e))?;
        Ok(store)
    }

    fn open_conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| backend(&format!("open {}", self.db_path.display()), e))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| backend("set journal_mode WAL", e))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| backend("set busy_timeout", e))?;

        Ok(conn)
    }
}

fn backend(what: &str, e: rusqlite::Error) -> StoreError {
    StoreError::Backend(format!("sqlite: {what}: {e}"))
}

fn encode_key(key: &RecordKey) -> String {
    key.to_value().to_string()
}

fn decode_body(collection: Collection, body: &str) -> Result<Value, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Malformed {
        collection: collection.name(),
        detail: e.to_string(),
    })
}

impl Store for SqliteStore {
    fn store_type(&self) -> &str {
        "sqlite"
    }

    fn get(&self, collection: Collection, key: &RecordKey) -> Result<Option<Value>, StoreError> {
        let conn = self.open_conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.name(), encode_key(key)],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| backend("get", e))?;
        body.map(|b| decode_body(collection, &b)).transpose()
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare("SELECT body FROM records WHERE collection = ?1 ORDER BY rowid")
            .map_err(|e| backend("prepare get_all", e))?;
        let bodies = stmt
            .query_map(params![collection.name()], |row| row.get::<_, String>(0))
            .map_err(|e| backend("get_all", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| backend("read row", e))?;
        bodies.iter().map(|b| decode_body(collection, b)).collect()
    }

    fn put(&self, collection: Collection, mut record: Value) -> Result<RecordKey, StoreError> {
        let mut conn = self.open_conn()?;
        let tx = conn.transaction().map_err(|e| backend("begin", e))?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT next_id FROM counters WHERE collection = ?1",
                params![collection.name()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| backend("read counter", e))?;
        let mut next_id = stored.and_then(|n| u64::try_from(n).ok()).unwrap_or(1);

        let key = assign_key(collection, &mut record, &mut next_id)?;
        let next_id = i64::try_from(next_id)
            .map_err(|_| StoreError::Backend("sqlite: id counter overflow".into()))?;

        tx.execute(
            "INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body",
            params![collection.name(), encode_key(&key), record.to_string()],
        )
        .map_err(|e| backend("upsert", e))?;
        tx.execute(
            "INSERT INTO counters (collection, next_id) VALUES (?1, ?2)
             ON CONFLICT(collection) DO UPDATE SET next_id = excluded.next_id",
            params![collection.name(), next_id],
        )
        .map_err(|e| backend("write counter", e))?;

        tx.commit().map_err(|e| backend("commit", e))?;
        Ok(key)
    }

    fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        self.open_conn()?
            .execute("DELETE FROM records WHERE collection = ?1", params![collection.name()])
            .map_err(|e| backend("clear", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("smriti.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_get_roundtrip_with_mixed_keys() {
        let (_dir, store) = open_tmp();
        store.put(Collection::Settings, json!({"id": "1", "value": "named"})).unwrap();
        let key = store.put(Collection::Messages, json!({"role": "user", "text": "hi"})).unwrap();
        assert_eq!(key, RecordKey::Int(1));
        let named = store.get(Collection::Settings, &"1".into()).unwrap().unwrap();
        assert_eq!(named["value"], "named");
        assert_eq!(store.get(Collection::Settings, &RecordKey::Int(1)).unwrap(), None);
    }

    #[test]
    fn upsert_preserves_order() {
        let (_dir, store) = open_tmp();
        store.put(Collection::Settings, json!({"id": "a", "value": 1})).unwrap();
        store.put(Collection::Settings, json!({"id": "b", "value": 2})).unwrap();
        store.put(Collection::Settings, json!({"id": "a", "value": 3})).unwrap();
        let all = store.get_all(Collection::Settings).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["value"], 3);
        assert_eq!(all[1]["id"], "b");
    }

    #[test]
    fn counter_survives_clear_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("smriti.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(Collection::Memory, json!({"text": "a"})).unwrap();
            store.clear(Collection::Memory).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get_all(Collection::Memory).unwrap().is_empty());
        assert_eq!(store.put(Collection::Memory, json!({"text": "b"})).unwrap(), RecordKey::Int(2));
    }
}
