//! Single-file embedded store backed by SQLite.
//!
//! All keys live in one table. Prefix queries use `substr` so that keys
//! containing `%` or `_` need no escaping.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{KvPair, Store, StoreCapabilities};

/// Embedded store, one database file per mount.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn sql_err(e: rusqlite::Error) -> StoreError {
    StoreError::Other(format!("sqlite: {}", e))
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::ConnectionFailed {
            backend: "sqlite".to_string(),
            source: Box::new(e),
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(sql_err)?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL
            );",
        )
        .map_err(sql_err)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<KvPair, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let value: Option<Vec<u8>> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(sql_err)?;
        value
            .map(|v| KvPair::new(key, v))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let removed = conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(sql_err)?;
        if removed == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn delete_tree(&self, prefix: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let removed = conn
            .execute(
                "DELETE FROM kv WHERE substr(key, 1, length(?1)) = ?1",
                params![prefix],
            )
            .map_err(sql_err)?;
        debug!(prefix, removed, "sqlite delete_tree");
        if removed == 0 {
            return Err(StoreError::NotFound(prefix.to_string()));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvPair>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn
            .prepare(
                "SELECT key, value FROM kv
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )
            .map_err(sql_err)?;
        let pairs = stmt
            .query_map(params![prefix], |row| {
                Ok(KvPair {
                    key: row.get(0)?,
                    value: row.get(1)?,
                })
            })
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;

        if pairs.is_empty() {
            return Err(StoreError::NotFound(prefix.to_string()));
        }
        Ok(pairs)
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities { atomic_move: true }
    }

    async fn move_key(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction().map_err(sql_err)?;
        let copied = tx
            .execute(
                "INSERT INTO kv (key, value) SELECT ?2, value FROM kv WHERE key = ?1
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![from, to],
            )
            .map_err(sql_err)?;
        if copied == 0 {
            return Err(StoreError::NotFound(from.to_string()));
        }
        if from != to {
            tx.execute("DELETE FROM kv WHERE key = ?1", params![from])
                .map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;
        Ok(())
    }
}
