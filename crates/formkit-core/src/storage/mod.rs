//! Storage abstraction for Formkit.
//!
//! The engine never performs I/O itself; every persistence call goes through
//! the [`RecordStore`] trait, a small key/record interface grouped by
//! collection.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: `BTreeMap` per collection, for tests and embedding
//! - [`SqliteStore`]: a single `records` table in SQLite (file or in-memory)
//!
//! Multi-record writes go through [`Batch`] so that one logical update (for
//! example all custom-field values of one entity) commits together or not at
//! all.

pub mod memory;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export public types
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{queue_next_id, RecordStore, RecordStoreExt, RecordView};
pub use types::{collections, Batch, BatchOp, Record, RecordFilter, StoreMetadata};
