//! SQLite-backed key-value store. Raw SQL with rusqlite, no ORM.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Mutex;

use super::KeyValueStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and migrate) the default on-disk store.
    pub fn open_default() -> Result<Self> {
        let db_path = crate::global::db_file()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        Self::open(&db_path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database connection")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a closure against the underlying connection. Used by the archive
    /// repository, which shares the database file.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create kv_state table")?;

    crate::archive::migrate(conn)?;

    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT value FROM kv_state WHERE key = ?1")
            .context("Failed to prepare kv query")?;

        let mut result = Map::new();
        for &key in keys {
            let row: Option<String> = stmt
                .query_row(params![key], |row| row.get(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })
                .context("Failed to read kv value")?;
            if let Some(json) = row {
                let value: Value =
                    serde_json::from_str(&json).context("Failed to parse stored kv value")?;
                result.insert(key.to_string(), value);
            }
        }
        Ok(result)
    }

    fn set(&self, entries: Map<String, Value>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        // The named fields are one snapshot; a reader must never see some
        // keys updated and others not.
        let tx = conn
            .unchecked_transaction()
            .context("Failed to begin kv transaction")?;
        for (key, value) in entries {
            let json = serde_json::to_string(&value).context("Failed to serialize kv value")?;
            tx.execute(
                "INSERT INTO kv_state (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
                params![key, json],
            )
            .context("Failed to write kv value")?;
        }
        tx.commit().context("Failed to commit kv transaction")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::keys;
    use serde_json::json;

    #[test]
    fn test_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entries = Map::new();
        entries.insert(keys::MEETING_TITLE.to_string(), json!("Weekly sync"));
        store.set(entries).unwrap();

        let result = store.get(&[keys::MEETING_TITLE]).unwrap();
        assert_eq!(result[keys::MEETING_TITLE], json!("Weekly sync"));
    }

    #[test]
    fn test_partial_overwrite_preserves_other_keys() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entries = Map::new();
        entries.insert(keys::TRANSCRIPT.to_string(), json!([{"personName": "A"}]));
        entries.insert(keys::CHAT_MESSAGES.to_string(), json!([]));
        store.set(entries).unwrap();

        let mut update = Map::new();
        update.insert(keys::CHAT_MESSAGES.to_string(), json!([{"personName": "B"}]));
        store.set(update).unwrap();

        let result = store.get(&[keys::TRANSCRIPT, keys::CHAT_MESSAGES]).unwrap();
        assert_eq!(result[keys::TRANSCRIPT].as_array().unwrap().len(), 1);
        assert_eq!(result[keys::CHAT_MESSAGES].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_keys_absent_from_result() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.get(&[keys::TRANSCRIPT, "unknown"]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_failed_write_leaves_no_partial_state() {
        let store = SqliteStore::open_in_memory().unwrap();
        // Reject one specific key so a multi-key write fails midway.
        store
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_poison BEFORE INSERT ON kv_state
                     WHEN NEW.key = 'zz-poison'
                     BEGIN SELECT RAISE(ABORT, 'rejected'); END",
                )?;
                Ok(())
            })
            .unwrap();

        let mut entries = Map::new();
        entries.insert(keys::TRANSCRIPT.to_string(), json!([{"personName": "A"}]));
        entries.insert("zz-poison".to_string(), json!("boom"));
        assert!(store.set(entries).is_err());

        // The write is all-or-nothing: the accepted key must not have
        // landed either.
        let result = store.get(&[keys::TRANSCRIPT, "zz-poison"]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_complex_value_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let blocks = json!([
            {"personName": "Alice", "timestamp": "t1", "transcriptText": "hi"},
            {"personName": "Bob", "timestamp": "t2", "transcriptText": "hello"},
        ]);
        let mut entries = Map::new();
        entries.insert(keys::TRANSCRIPT.to_string(), blocks.clone());
        store.set(entries).unwrap();

        let result = store.get(&[keys::TRANSCRIPT]).unwrap();
        assert_eq!(result[keys::TRANSCRIPT], blocks);
    }
}
