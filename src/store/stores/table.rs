//! Collection table and key assignment shared by the store backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Collection, RecordKey, StoreError};

/// One collection's records plus its id counter. This is also the on-disk
/// shape of a `<collection>.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionData {
    pub next_id: u64,
    pub records: Vec<Value>,
}

impl Default for CollectionData {
    fn default() -> Self {
        Self { next_id: 1, records: Vec::new() }
    }
}

impl CollectionData {
    pub fn get(&self, key: &RecordKey) -> Option<Value> {
        self.records
            .iter()
            .find(|r| RecordKey::of(r).as_ref() == Some(key))
            .cloned()
    }

    /// Upsert. An existing record keeps its position; new ones are appended.
    pub fn put(&mut self, collection: Collection, mut record: Value) -> Result<RecordKey, StoreError> {
        let key = assign_key(collection, &mut record, &mut self.next_id)?;
        match self.records.iter().position(|r| RecordKey::of(r).as_ref() == Some(&key)) {
            Some(i) => self.records[i] = record,
            None => self.records.push(record),
        }
        Ok(key)
    }

    /// Drop every record. The id counter keeps running so cleared ids are
    /// never reused.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Resolve the key a record is stored under, writing an auto-assigned `id`
/// into it when needed. Advances `next_id` past any integer key.
pub fn assign_key(
    collection: Collection,
    record: &mut Value,
    next_id: &mut u64,
) -> Result<RecordKey, StoreError> {
    let existing = RecordKey::of(record);
    let has_id = record.get("id").is_some();
    let Some(obj) = record.as_object_mut() else {
        return Err(StoreError::Malformed {
            collection: collection.name(),
            detail: "record is not a JSON object".into(),
        });
    };

    let key = match existing {
        Some(key) => key,
        None if has_id => {
            return Err(StoreError::Malformed {
                collection: collection.name(),
                detail: "id must be a string or a non-negative integer".into(),
            });
        }
        None if collection.auto_increment() => {
            let key = RecordKey::Int(*next_id);
            obj.insert("id".into(), key.to_value());
            key
        }
        None => return Err(StoreError::MissingKey(collection.name())),
    };

    if let RecordKey::Int(n) = key {
        *next_id = (*next_id).max(n + 1);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_increment_assigns_sequential_ids() {
        let mut t = CollectionData::default();
        let a = t.put(Collection::Memory, json!({"text": "a"})).unwrap();
        let b = t.put(Collection::Memory, json!({"text": "b"})).unwrap();
        assert_eq!((a, b), (RecordKey::Int(1), RecordKey::Int(2)));
        assert_eq!(t.records[1]["id"], 2);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut t = CollectionData::default();
        t.put(Collection::Settings, json!({"id": "modelName", "value": "a"})).unwrap();
        t.put(Collection::Settings, json!({"id": "apiKeys", "value": []})).unwrap();
        t.put(Collection::Settings, json!({"id": "modelName", "value": "b"})).unwrap();
        assert_eq!(t.records.len(), 2);
        assert_eq!(t.records[0]["value"], "b");
    }

    #[test]
    fn explicit_int_id_advances_counter() {
        let mut t = CollectionData::default();
        t.put(Collection::Messages, json!({"id": 10, "text": "x"})).unwrap();
        assert_eq!(t.put(Collection::Messages, json!({"text": "y"})).unwrap(), RecordKey::Int(11));
    }

    #[test]
    fn settings_require_id() {
        let mut t = CollectionData::default();
        let err = t.put(Collection::Settings, json!({"value": 1})).unwrap_err();
        assert!(matches!(err, StoreError::MissingKey("settings")));
    }

    #[test]
    fn non_object_and_bad_id_rejected() {
        let mut t = CollectionData::default();
        assert!(matches!(t.put(Collection::Memory, json!("x")), Err(StoreError::Malformed { .. })));
        assert!(matches!(
            t.put(Collection::Memory, json!({"id": true})),
            Err(StoreError::Malformed { .. })
        ));
    }

    #[test]
    fn clear_keeps_counter() {
        let mut t = CollectionData::default();
        t.put(Collection::Memory, json!({"text": "a"})).unwrap();
        t.clear();
        assert!(t.records.is_empty());
        assert_eq!(t.put(Collection::Memory, json!({"text": "b"})).unwrap(), RecordKey::Int(2));
    }
}
