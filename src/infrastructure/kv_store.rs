//! Key-value storage backed by SQLite.
//!
//! Values are opaque strings read and written as a whole; callers layer
//! typed JSON on top (see `application::checkpoint`).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{AppError, Result};

/// Persistent asynchronous get/set by string key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Replaces several values at once; either every entry is stored or none.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()>;
}

const UPSERT: &str = r"
    INSERT INTO kv (key, value) VALUES (?1, ?2)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = datetime('now')
";

/// Key-value store using a single SQLite table.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Opens or creates the store database.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or schema creation fails.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create storage directory", e))?;
        }

        let conn = Connection::open(path).map_err(AppError::storage)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(AppError::storage)?;

        Self::with_connection(conn)
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    /// Returns error if schema creation fails.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )
        .map_err(AppError::storage)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AppError::Storage {
            message: "Storage connection lock poisoned".into(),
            source: None,
        })
    }

    /// Lists stored keys with their last update time.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn keys(&self) -> Result<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key, updated_at FROM kv ORDER BY key")
            .map_err(AppError::storage)?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(AppError::storage)?;

        let mut keys = Vec::new();
        for row in rows {
            match row {
                Ok(entry) => keys.push(entry),
                Err(e) => tracing::warn!("Failed to read key row: {}", e),
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(AppError::storage)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(UPSERT, params![key, value])
            .map_err(AppError::storage)?;

        tracing::trace!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(AppError::storage)?;
        for (key, value) in entries {
            tx.execute(UPSERT, params![key, value])
                .map_err(AppError::storage)?;
        }
        tx.commit().map_err(AppError::storage)?;

        tracing::trace!(count = entries.len(), "Stored values");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let store = SqliteKvStore::open_in_memory().unwrap();

        assert_eq!(store.get("contacts").await.unwrap(), None);

        store.set("contacts", "[1]").await.unwrap();
        store.set("contacts", "[1,2]").await.unwrap();

        assert_eq!(store.get("contacts").await.unwrap().as_deref(), Some("[1,2]"));
    }

    #[tokio::test]
    async fn test_set_many_rolls_back_on_failure() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.set("a", "old-a").await.unwrap();
        store.set("b", "old-b").await.unwrap();
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_b BEFORE UPDATE ON kv WHEN NEW.key = 'b'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store
            .set_many(&[("a", "new-a".to_string()), ("b", "new-b".to_string())])
            .await;

        assert!(result.is_err());
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("old-a"));
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("old-b"));
    }

    #[tokio::test]
    async fn test_set_many_writes_every_entry() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store
            .set_many(&[("a", "1".to_string()), ("b", "2".to_string())])
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("storage.db");

        {
            let store = SqliteKvStore::open(&db_path).unwrap();
            store.set("date_format", "\"YYYY-MM-DD\"").await.unwrap();
        }

        let store = SqliteKvStore::open(&db_path).unwrap();
        assert_eq!(
            store.get("date_format").await.unwrap().as_deref(),
            Some("\"YYYY-MM-DD\"")
        );
        let keys = store.keys().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].0, "date_format");
    }
}
