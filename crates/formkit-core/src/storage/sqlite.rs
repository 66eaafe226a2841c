//! SQLite storage backend.
//!
//! Every collection lives in one `records` table keyed by
//! `(collection, key)`, with the record body stored as JSON text. Batches run
//! inside a single transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::debug;

use super::traits::{RecordStore, RecordView};
use super::types::{Batch, BatchOp, Record, RecordFilter, StoreMetadata};
use crate::error::{FormError, Result};

/// Current on-disk format version.
pub const FORMAT_VERSION: &str = "0.1";

/// SQLite-backed record store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new store file at the specified path.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Storage` if the file already exists or cannot be
    /// written.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(FormError::Storage(format!(
                "Store file already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::initialize(&conn)?;
        debug!(path = %path.display(), "created sqlite store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing store file.
    ///
    /// # Errors
    ///
    /// Returns `FormError::NotFound` if the file does not exist, and
    /// `FormError::Storage` if it is not a Formkit store.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FormError::NotFound(format!(
                "Store file {}",
                path.display()
            )));
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'format_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FormError::Storage(format!("Not a formkit store: {}", e)))?;
        if version.is_none() {
            return Err(FormError::Storage(
                "Not a formkit store: missing format version".to_string(),
            ));
        }

        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                key TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,

                PRIMARY KEY (collection, key)
            );
            "#,
        )?;

        let created_at = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES (?, ?)",
            ["format_version", FORMAT_VERSION],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES (?, ?)",
            ["created_at", &created_at],
        )?;
        Ok(())
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FormError::Storage("SQLite connection poisoned".to_string()))
    }

    /// Get store metadata.
    pub fn metadata(&self) -> Result<StoreMetadata> {
        let conn = self.lock_conn()?;
        let read = |key: &str| -> Result<String> {
            conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .map_err(|e| FormError::Storage(format!("Missing meta '{}': {}", key, e)))
        };

        let format_version = read("format_version")?;
        let created_at = DateTime::parse_from_rfc3339(&read("created_at")?)
            .map_err(|e| FormError::Storage(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(StoreMetadata {
            format_version,
            created_at,
        })
    }

    /// Check store integrity.
    ///
    /// Verifies SQLite page integrity and that every record body is valid JSON.
    pub fn check_integrity(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        let status: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if status != "ok" {
            return Err(FormError::Storage(format!(
                "Integrity check failed: {}",
                status
            )));
        }

        let mut stmt = conn.prepare("SELECT collection, key, body FROM records")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (collection, key, body) = row?;
            serde_json::from_str::<Value>(&body).map_err(|e| {
                FormError::Storage(format!(
                    "Corrupt record {}/{}: {}",
                    collection, key, e
                ))
            })?;
        }

        Ok(())
    }
}

fn parse_body(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| FormError::Storage(format!("Invalid record JSON: {}", e)))
}

const UPSERT_SQL: &str = r#"
    INSERT INTO records (collection, key, body, updated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(collection, key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
"#;

fn read_in(conn: &Connection, collection: &str, key: &str) -> Result<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM records WHERE collection = ? AND key = ?",
            [collection, key],
            |row| row.get(0),
        )
        .optional()?;

    body.as_deref().map(parse_body).transpose()
}

fn query_in(conn: &Connection, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
    let mut stmt =
        conn.prepare("SELECT key, body FROM records WHERE collection = ? ORDER BY key")?;
    let rows = stmt.query_map([collection], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (key, body) = row?;
        let body = parse_body(&body)?;
        if !filter.matches(&body) {
            continue;
        }
        records.push(Record { key, body });
        if filter.limit.is_some_and(|limit| records.len() >= limit) {
            break;
        }
    }

    Ok(records)
}

fn apply_in(conn: &Connection, batch: &Batch) -> Result<()> {
    let updated_at = Utc::now().to_rfc3339();
    for op in batch.ops() {
        match op {
            BatchOp::Put {
                collection,
                key,
                record,
            } => {
                let body = serde_json::to_string(record)?;
                conn.execute(UPSERT_SQL, params![collection, key, body, updated_at])?;
            }
            BatchOp::Delete { collection, key } => {
                conn.execute(
                    "DELETE FROM records WHERE collection = ? AND key = ?",
                    params![collection, key],
                )?;
            }
        }
    }
    Ok(())
}

/// Reads inside an open transaction.
struct TransactionView<'a>(&'a Connection);

impl RecordView for TransactionView<'_> {
    fn read(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        read_in(self.0, collection, key)
    }

    fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        query_in(self.0, collection, filter)
    }
}

impl RecordStore for SqliteStore {
    fn read(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        read_in(&*self.lock_conn()?, collection, key)
    }

    fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        query_in(&*self.lock_conn()?, collection, filter)
    }

    fn write(&self, collection: &str, key: &str, record: &Value) -> Result<()> {
        let conn = self.lock_conn()?;
        let body = serde_json::to_string(record)?;
        conn.execute(
            UPSERT_SQL,
            params![collection, key, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ? AND key = ?",
            [collection, key],
        )?;
        Ok(removed > 0)
    }

    fn apply(&self, batch: &Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        // Dropping `tx` on an early return rolls the batch back.
        apply_in(&tx, batch)?;
        tx.commit()?;
        Ok(())
    }

    fn transact(&self, plan: &mut dyn FnMut(&dyn RecordView) -> Result<Batch>) -> Result<()> {
        let mut conn = self.lock_conn()?;
        // IMMEDIATE takes the write lock up front, so other connections to
        // the same file cannot commit between the plan's reads and its writes.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let batch = plan(&TransactionView(&*tx))?;
        apply_in(&tx, &batch)?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_memory_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write("c", "k", &json!({"a": [1, 2]})).unwrap();
        assert_eq!(store.read("c", "k").unwrap(), Some(json!({"a": [1, 2]})));

        store.write("c", "k", &json!({"a": 3})).unwrap();
        assert_eq!(store.read("c", "k").unwrap(), Some(json!({"a": 3})));
    }

    #[test]
    fn test_query_filters_and_orders() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write("c", "2", &json!({"m": "x"})).unwrap();
        store.write("c", "1", &json!({"m": "x"})).unwrap();
        store.write("c", "3", &json!({"m": "y"})).unwrap();
        store.write("other", "0", &json!({"m": "x"})).unwrap();

        let records = store.query("c", &RecordFilter::new().eq("m", "x")).unwrap();
        let keys: Vec<_> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2"]);
    }

    #[test]
    fn test_transact_sees_reads_and_rolls_back_on_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write("c", "n", &json!({"value": 1})).unwrap();

        store
            .transact(&mut |view| {
                let current = view
                    .read("c", "n")?
                    .and_then(|body| body["value"].as_u64())
                    .unwrap_or(0);
                let mut batch = Batch::new();
                batch.put("c", "n", json!({"value": current + 1}));
                Ok(batch)
            })
            .unwrap();
        assert_eq!(store.read("c", "n").unwrap(), Some(json!({"value": 2})));

        let failed = store.transact(&mut |_view| {
            Err(FormError::InvalidInput("rejected".to_string()))
        });
        assert!(failed.is_err());
        assert_eq!(store.read("c", "n").unwrap(), Some(json!({"value": 2})));
    }

    #[test]
    fn test_metadata_and_integrity() {
        let store = SqliteStore::open_in_memory().unwrap();
        let meta = store.metadata().unwrap();
        assert_eq!(meta.format_version, FORMAT_VERSION);
        store.check_integrity().unwrap();
    }
}
