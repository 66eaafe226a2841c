//! In-memory record store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use super::traits::{RecordStore, RecordView};
use super::types::{Batch, BatchOp, Record, RecordFilter};
use crate::error::{FormError, Result};

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// Record store backed by ordered maps. Cheap to create; nothing persists.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| FormError::Storage("Memory store lock poisoned".to_string()))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| FormError::Storage("Memory store lock poisoned".to_string()))
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> Result<usize> {
        Ok(self
            .read_guard()?
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0))
    }
}

/// Borrowed view of the collections, used inside a transaction.
struct Snapshot<'a>(&'a Collections);

impl RecordView for Snapshot<'_> {
    fn read(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        Ok(read_in(self.0, collection, key))
    }

    fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        Ok(query_in(self.0, collection, filter))
    }
}

fn read_in(collections: &Collections, collection: &str, key: &str) -> Option<Value> {
    collections
        .get(collection)
        .and_then(|records| records.get(key))
        .cloned()
}

fn query_in(collections: &Collections, collection: &str, filter: &RecordFilter) -> Vec<Record> {
    let Some(records) = collections.get(collection) else {
        return Vec::new();
    };

    let matching = records
        .iter()
        .filter(|(_, body)| filter.matches(body))
        .map(|(key, body)| Record {
            key: key.clone(),
            body: body.clone(),
        });

    match filter.limit {
        Some(limit) => matching.take(limit).collect(),
        None => matching.collect(),
    }
}

fn apply_in(collections: &mut Collections, batch: &Batch) {
    for op in batch.ops() {
        match op {
            BatchOp::Put {
                collection,
                key,
                record,
            } => {
                collections
                    .entry(collection.clone())
                    .or_default()
                    .insert(key.clone(), record.clone());
            }
            BatchOp::Delete { collection, key } => {
                if let Some(records) = collections.get_mut(collection) {
                    records.remove(key);
                }
            }
        }
    }
}

impl RecordStore for MemoryStore {
    fn read(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        Ok(read_in(&*self.read_guard()?, collection, key))
    }

    fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        Ok(query_in(&*self.read_guard()?, collection, filter))
    }

    fn write(&self, collection: &str, key: &str, record: &Value) -> Result<()> {
        self.write_guard()?
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        Ok(self
            .write_guard()?
            .get_mut(collection)
            .and_then(|records| records.remove(key))
            .is_some())
    }

    fn apply(&self, batch: &Batch) -> Result<()> {
        // Single write lock for the whole batch: readers see all or nothing.
        apply_in(&mut *self.write_guard()?, batch);
        Ok(())
    }

    fn transact(&self, plan: &mut dyn FnMut(&dyn RecordView) -> Result<Batch>) -> Result<()> {
        let mut guard = self.write_guard()?;
        let batch = plan(&Snapshot(&*guard))?;
        apply_in(&mut guard, &batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RecordStoreExt;
    use serde_json::json;

    #[test]
    fn test_write_read_delete() {
        let store = MemoryStore::new();
        store.write("c", "k", &json!({"a": 1})).unwrap();

        assert_eq!(store.read("c", "k").unwrap(), Some(json!({"a": 1})));
        assert!(store.delete("c", "k").unwrap());
        assert!(!store.delete("c", "k").unwrap());
        assert_eq!(store.read("c", "k").unwrap(), None);
    }

    #[test]
    fn test_query_orders_by_key_and_limits() {
        let store = MemoryStore::new();
        store.write("c", "b", &json!({"kind": "x"})).unwrap();
        store.write("c", "a", &json!({"kind": "x"})).unwrap();
        store.write("c", "c", &json!({"kind": "y"})).unwrap();

        let all_x = store
            .query("c", &RecordFilter::new().eq("kind", "x"))
            .unwrap();
        let keys: Vec<_> = all_x.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);

        let limited = store.query("c", &RecordFilter::new().limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].key, "a");
    }

    #[test]
    fn test_apply_batch() {
        let store = MemoryStore::new();
        store.write("c", "old", &json!(1)).unwrap();

        let mut batch = Batch::new();
        batch.put("c", "new", json!(2));
        batch.delete("c", "old");
        batch.delete("missing", "nothing");
        store.apply(&batch).unwrap();

        assert_eq!(store.read("c", "old").unwrap(), None);
        assert_eq!(store.read("c", "new").unwrap(), Some(json!(2)));
        assert_eq!(store.len("c").unwrap(), 1);
    }

    #[test]
    fn test_transact_error_writes_nothing() {
        let store = MemoryStore::new();
        let result = store.transact(&mut |_view| {
            Err(FormError::InvalidInput("rejected".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.len("c").unwrap(), 0);

        store
            .transact(&mut |view| {
                let mut batch = Batch::new();
                let seen = view.read("c", "k")?.is_some();
                batch.put("c", "k", json!({ "seen": seen }));
                Ok(batch)
            })
            .unwrap();
        assert_eq!(store.read("c", "k").unwrap(), Some(json!({"seen": false})));
    }

    #[test]
    fn test_next_id_is_unique_across_threads() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| store.next_id("rules").unwrap())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(ids.last(), Some(&400));
    }

    #[test]
    fn test_next_id_is_ascending() {
        let store = MemoryStore::new();
        assert_eq!(store.next_id("rules").unwrap(), 1);
        assert_eq!(store.next_id("rules").unwrap(), 2);
        assert_eq!(store.next_id("other").unwrap(), 1);
    }
}
