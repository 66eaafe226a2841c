//! Record store trait definition.
//!
//! The `RecordStore` trait defines the persistence interface the engine
//! consumes: read, query, write, delete, an atomic batch, and a
//! read-modify-write transaction. It sits on top of a relational table, a
//! document store, or an in-memory map.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::types::{collections, Batch, Record, RecordFilter};
use crate::error::{FormError, Result};

/// Read access handed to a [`RecordStore::transact`] plan.
pub trait RecordView {
    /// Read one record.
    fn read(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// List records of a collection matching the filter, ordered by key.
    fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>>;
}

impl<'v> dyn RecordView + 'v {
    /// Read and deserialize one record.
    pub fn get_as<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<Option<T>> {
        match self.read(collection, key)? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Query and deserialize records.
    pub fn query_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<T>> {
        decode(self.query(collection, filter)?)
    }
}

fn decode<T: DeserializeOwned>(records: Vec<Record>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|record| serde_json::from_value(record.body).map_err(Into::into))
        .collect()
}

/// Reserve the next value of a named ascending sequence (starting at 1),
/// queueing the counter update on `batch`.
pub fn queue_next_id(view: &dyn RecordView, batch: &mut Batch, sequence: &str) -> Result<u64> {
    let current = view
        .read(collections::SEQUENCES, sequence)?
        .and_then(|body| body.get("value").and_then(Value::as_u64))
        .unwrap_or(0);
    let next = current + 1;
    batch.put(collections::SEQUENCES, sequence, json!({ "value": next }));
    Ok(next)
}

/// Persistence interface for engine metadata and custom-field values.
///
/// All implementations must ensure:
/// - `apply` commits every op of a batch or none of them
/// - `query` returns records ordered by key
/// - Methods take `&self`; implementations synchronize internally
pub trait RecordStore: Send + Sync {
    /// Read one record.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(record))` if found, `Ok(None)` if not found.
    fn read(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// List records of a collection matching the filter, ordered by key.
    fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>>;

    /// Insert or replace one record.
    fn write(&self, collection: &str, key: &str, record: &Value) -> Result<()>;

    /// Delete one record.
    ///
    /// # Returns
    ///
    /// Returns `true` if a record was removed.
    fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    /// Apply a batch of writes atomically.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Storage` if the backend fails; in that case no op
    /// of the batch is visible.
    fn apply(&self, batch: &Batch) -> Result<()>;

    /// Run `plan` against the current records and apply the batch it returns
    /// as one unit. No other write lands between the plan's reads and the
    /// batch. `plan` must not call back into the store.
    ///
    /// # Errors
    ///
    /// An error from `plan` aborts the transaction with nothing written.
    fn transact(&self, plan: &mut dyn FnMut(&dyn RecordView) -> Result<Batch>) -> Result<()>;
}

/// Typed helpers layered over any [`RecordStore`].
pub trait RecordStoreExt: RecordStore {
    /// Read and deserialize one record.
    fn get_as<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<Option<T>> {
        match self.read(collection, key)? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Serialize and write one record.
    fn put_as<T: Serialize>(&self, collection: &str, key: &str, record: &T) -> Result<()> {
        let body = serde_json::to_value(record)?;
        self.write(collection, key, &body)
    }

    /// Query and deserialize records.
    fn query_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<T>> {
        decode(self.query(collection, filter)?)
    }

    /// [`RecordStore::transact`] with a plan that also produces a result.
    fn transact_with<T>(
        &self,
        mut plan: impl FnMut(&dyn RecordView) -> Result<(Batch, T)>,
    ) -> Result<T> {
        let mut output = None;
        self.transact(&mut |view| {
            let (batch, value) = plan(view)?;
            output = Some(value);
            Ok(batch)
        })?;
        output.ok_or_else(|| FormError::Storage("Transaction plan did not run".to_string()))
    }

    /// Allocate the next value of a named ascending sequence (starting at 1).
    fn next_id(&self, sequence: &str) -> Result<u64> {
        self.transact_with(|view| {
            let mut batch = Batch::new();
            let id = queue_next_id(view, &mut batch, sequence)?;
            Ok((batch, id))
        })
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_is_object_safe() {
        fn _accepts_dyn_store(_store: &dyn RecordStore) {}
    }
}
