//! SQLite-backed store
//!
//! A single `kv_store` table keyed by the storage key. rusqlite is
//! synchronous, so every call runs on the blocking pool while holding the
//! connection mutex.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tether_core::DurableStore;
use tether_domain::Result;
use tracing::{debug, info};

use crate::errors::InfraError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS kv_store (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Key/value store in a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    ///
    /// # Errors
    /// Returns `TetherError::Storage` when the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(InfraError::from)?;
        let store = Self::init(conn)?;
        info!(db_path = %path.display(), "sqlite store opened");
        Ok(store)
    }

    /// Database living only as long as this store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(InfraError::from)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(InfraError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(InfraError::from)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Number of stored keys.
    pub async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let outcome = tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            op(&guard)
        })
        .await
        .map_err(InfraError::from)?;
        outcome.map_err(|err| InfraError::from(err).into())
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
        })
        .await
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        let bytes = value.len();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = strftime('%s', 'now')",
                params![key, value],
            )
        })
        .await?;
        debug!(bytes, "sqlite store row written");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_item("k").await.unwrap(), None);

        store.set_item("k", "v1".into()).await.unwrap();
        store.set_item("k", "v2".into()).await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.count().await.unwrap(), 1);

        store.remove_item("k").await.unwrap();
        store.remove_item("k").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tether.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set_item("tether.response_cache", "{\"version\":1}".into()).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("tether.response_cache").await.unwrap().as_deref(),
            Some("{\"version\":1}")
        );
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let result = SqliteStore::open(dir.path().join("missing").join("tether.db"));
        assert!(matches!(result, Err(tether_domain::TetherError::Storage(_))));
    }
}
