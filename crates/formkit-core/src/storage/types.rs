//! Core data types for the storage layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Collection names used by the engine.
pub mod collections {
    pub const FIELD_DEFINITIONS: &str = "field_definitions";
    pub const FIELD_DEPENDENCIES: &str = "field_dependencies";
    pub const CUSTOM_FIELD_VALUES: &str = "custom_field_values";
    pub const FORM_TEMPLATES: &str = "form_templates";
    pub const MODULE_FIELD_CONFIG: &str = "module_field_config";
    pub const SEQUENCES: &str = "sequences";
}

/// Metadata for a persistent store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Format version (e.g., "0.1")
    pub format_version: String,

    /// When this store was created
    pub created_at: DateTime<Utc>,
}

/// A stored record together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub body: Value,
}

/// Filter for querying a collection.
///
/// Predicates are top-level field equalities combined with AND. A predicate
/// on `null` also matches records where the field is absent.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Field equality predicates
    pub equals: Vec<(String, Value)>,

    /// Maximum number of results
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether a record body satisfies every predicate.
    pub fn matches(&self, body: &Value) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| body.get(field).unwrap_or(&Value::Null) == expected)
    }
}

/// A single write inside a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Put {
        collection: String,
        key: String,
        record: Value,
    },
    Delete {
        collection: String,
        key: String,
    },
}

/// An ordered set of writes applied atomically by [`RecordStore::apply`].
///
/// [`RecordStore::apply`]: super::RecordStore::apply
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an insert-or-replace of a raw JSON record.
    pub fn put(&mut self, collection: &str, key: impl Into<String>, record: Value) {
        self.ops.push(BatchOp::Put {
            collection: collection.to_string(),
            key: key.into(),
            record,
        });
    }

    /// Queue an insert-or-replace of a serializable record.
    pub fn put_record<T: Serialize>(
        &mut self,
        collection: &str,
        key: impl Into<String>,
        record: &T,
    ) -> Result<()> {
        let record = serde_json::to_value(record)?;
        self.put(collection, key, record);
        Ok(())
    }

    /// Queue a delete. Deleting a missing key is not an error.
    pub fn delete(&mut self, collection: &str, key: impl Into<String>) {
        self.ops.push(BatchOp::Delete {
            collection: collection.to_string(),
            key: key.into(),
        });
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
