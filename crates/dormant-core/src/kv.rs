//! Key-value persistence scopes.
//!
//! The engine shares two scopes with its collaborators: a small synchronized
//! scope for user settings and a larger local scope for the suspension
//! envelope. Values are whole JSON documents; a `set` replaces the previous
//! value in one step or not at all.

use crate::{DormantError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::debug;

/// Name of the local (large) scope.
pub const LOCAL_SCOPE: &str = "local";

/// Name of the synchronized (small-quota) scope.
pub const SYNC_SCOPE: &str = "sync";

/// Per-item quota of the synchronized scope, in bytes of serialized JSON.
pub const SYNC_QUOTA_BYTES_PER_ITEM: usize = 8192;

/// A JSON key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key` atomically.
    fn set(&self, key: &str, value: &Value) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

fn check_quota(quota: Option<usize>, key: &str, encoded: &str) -> Result<()> {
    match quota {
        Some(quota) if encoded.len() > quota => Err(DormantError::QuotaExceeded {
            key: key.to_string(),
            size: encoded.len(),
            quota,
        }),
        _ => Ok(()),
    }
}

/// SQLite-backed key-value scope.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
    scope: String,
    quota: Option<usize>,
}

impl SqliteKvStore {
    /// Open or create the database at the given path and bind to `scope`.
    pub fn open(path: &Path, scope: &str) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn, scope)
    }

    /// A private in-memory database, mostly for tests.
    pub fn open_in_memory(scope: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, scope)
    }

    fn with_connection(conn: Connection, scope: &str) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            scope: scope.to_string(),
            quota: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Reject values whose serialized form exceeds `bytes`.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        // journal_mode returns a row.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                scope TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (scope, key)
            );
            "#,
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv WHERE scope = ?1 AND key = ?2",
                params![self.scope, key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(DormantError::from))
            .transpose()
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        check_quota(self.quota, key, &encoded)?;

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        // Single statement: the old row stays intact unless the new one commits.
        conn.execute(
            r#"
            INSERT INTO kv (scope, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(scope, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![self.scope, key, encoded, chrono::Utc::now().to_rfc3339()],
        )?;
        debug!(target: "dormant::store", "Wrote {}:{} ({} bytes)", self.scope, key, encoded.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "DELETE FROM kv WHERE scope = ?1 AND key = ?2",
            params![self.scope, key],
        )?;
        Ok(())
    }
}

/// Volatile key-value scope.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    values: RwLock<HashMap<String, Value>>,
    quota: Option<usize>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        check_quota(self.quota, key, &encoded)?;
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_scopes_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("state.db");

        let local = SqliteKvStore::open(&db_path, LOCAL_SCOPE).unwrap();
        let sync = SqliteKvStore::open(&db_path, SYNC_SCOPE).unwrap();

        local.set("settings", &json!({"from": "local"})).unwrap();
        assert_eq!(sync.get("settings").unwrap(), None);

        sync.set("settings", &json!({"from": "sync"})).unwrap();
        assert_eq!(local.get("settings").unwrap(), Some(json!({"from": "local"})));
        assert_eq!(sync.get("settings").unwrap(), Some(json!({"from": "sync"})));
    }

    #[test]
    fn test_sqlite_set_replaces_and_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("state.db");

        {
            let store = SqliteKvStore::open(&db_path, LOCAL_SCOPE).unwrap();
            store.set("k", &json!([1])).unwrap();
            store.set("k", &json!([1, 2])).unwrap();
        }

        let store = SqliteKvStore::open(&db_path, LOCAL_SCOPE).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!([1, 2])));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_quota_rejection_keeps_previous_value() {
        let store = SqliteKvStore::open_in_memory(SYNC_SCOPE)
            .unwrap()
            .with_quota(32);
        store.set("settings", &json!({"a": 1})).unwrap();

        let big = json!({"whitelist": ["x".repeat(64)]});
        let err = store.set("settings", &big).unwrap_err();
        assert!(matches!(err, DormantError::QuotaExceeded { quota: 32, .. }));
        assert_eq!(store.get("settings").unwrap(), Some(json!({"a": 1})));

        let memory = MemoryKvStore::new().with_quota(8);
        assert!(memory.set("k", &big).is_err());
        assert_eq!(memory.get("k").unwrap(), None);
    }
}
