//! Durable key-value layer.
//!
//! Each store owns one namespace and keeps its whole snapshot under a single
//! key. Writes go through `write_batch`, which applies every operation or
//! none, so one engine transaction lands on disk atomically.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Key under which a store persists its full snapshot.
pub const SNAPSHOT_KEY: &str = "snapshot";

/// Disjoint key namespaces, one per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Users,
    Jobs,
    Inventory,
    InventoryRequests,
    Audit,
    Notifications,
}

impl Namespace {
    pub const ALL: [Namespace; 6] = [
        Namespace::Users,
        Namespace::Jobs,
        Namespace::Inventory,
        Namespace::InventoryRequests,
        Namespace::Audit,
        Namespace::Notifications,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Users => "users",
            Namespace::Jobs => "jobs",
            Namespace::Inventory => "inventory",
            Namespace::InventoryRequests => "inventory_requests",
            Namespace::Audit => "audit",
            Namespace::Notifications => "notifications",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single write in a batch.
#[derive(Debug, Clone)]
pub enum Operation {
    Put {
        namespace: Namespace,
        key: String,
        value: Vec<u8>,
    },
    Delete {
        namespace: Namespace,
        key: String,
    },
}

/// Storage backend. The engine is the only writer.
pub trait KvStore {
    /// Read one value.
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>>;

    /// Apply all operations atomically.
    fn write_batch(&mut self, ops: Vec<Operation>) -> Result<()>;

    /// Keys present in a namespace, sorted.
    fn keys(&self, namespace: Namespace) -> Result<Vec<String>>;
}

/// Load and decode a store snapshot. `None` when nothing was ever written.
pub fn load_snapshot<T: DeserializeOwned>(
    kv: &dyn KvStore,
    namespace: Namespace,
) -> Result<Option<T>> {
    match kv.get(namespace, SNAPSHOT_KEY)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode a store snapshot as a put operation.
pub fn snapshot_op<T: Serialize>(namespace: Namespace, value: &T) -> Result<Operation> {
    Ok(Operation::Put {
        namespace,
        key: SNAPSHOT_KEY.to_string(),
        value: serde_json::to_vec(value)?,
    })
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Volatile backend for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryKv {
    data: HashMap<Namespace, BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .data
            .get(&namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn write_batch(&mut self, ops: Vec<Operation>) -> Result<()> {
        for op in ops {
            match op {
                Operation::Put {
                    namespace,
                    key,
                    value,
                } => {
                    self.data.entry(namespace).or_default().insert(key, value);
                }
                Operation::Delete { namespace, key } => {
                    if let Some(entries) = self.data.get_mut(&namespace) {
                        entries.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn keys(&self, namespace: Namespace) -> Result<Vec<String>> {
        Ok(self
            .data
            .get(&namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// SQLite backend
// ---------------------------------------------------------------------------

/// SQLite-file backend. Owns the connection; the process is the only writer.
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mut kv = Self { conn };
        kv.init()?;
        Ok(kv)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut kv = Self { conn };
        kv.init()?;
        Ok(kv)
    }

    fn init(&mut self) -> Result<()> {
        self.conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                namespace   TEXT NOT NULL,
                key         TEXT NOT NULL,
                value       BLOB NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            ",
        )?;

        Ok(())
    }
}

impl KvStore for SqliteKv {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                params![namespace.as_str(), key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_batch(&mut self, ops: Vec<Operation>) -> Result<()> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        for op in &ops {
            match op {
                Operation::Put {
                    namespace,
                    key,
                    value,
                } => {
                    tx.execute(
                        "INSERT INTO kv (namespace, key, value, updated_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT (namespace, key)
                         DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                        params![namespace.as_str(), key, value, now],
                    )?;
                }
                Operation::Delete { namespace, key } => {
                    tx.execute(
                        "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                        params![namespace.as_str(), key],
                    )?;
                }
            }
        }

        tx.commit()?;
        tracing::debug!(ops = ops.len(), "batch committed");
        Ok(())
    }

    fn keys(&self, namespace: Namespace) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv WHERE namespace = ?1 ORDER BY key ASC")?;
        let keys = stmt
            .query_map(params![namespace.as_str()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(namespace: Namespace, key: &str, value: &str) -> Operation {
        Operation::Put {
            namespace,
            key: key.to_string(),
            value: value.as_bytes().to_vec(),
        }
    }

    fn exercise(kv: &mut dyn KvStore) {
        kv.write_batch(vec![
            put(Namespace::Jobs, "snapshot", "jobs-v1"),
            put(Namespace::Users, "snapshot", "users-v1"),
        ])
        .unwrap();

        assert_eq!(
            kv.get(Namespace::Jobs, "snapshot").unwrap().as_deref(),
            Some("jobs-v1".as_bytes())
        );
        assert_eq!(
            kv.get(Namespace::Users, "snapshot").unwrap().as_deref(),
            Some("users-v1".as_bytes())
        );
        // Same key, different namespace.
        assert!(kv.get(Namespace::Audit, "snapshot").unwrap().is_none());

        kv.write_batch(vec![
            put(Namespace::Jobs, "snapshot", "jobs-v2"),
            Operation::Delete {
                namespace: Namespace::Users,
                key: "snapshot".to_string(),
            },
        ])
        .unwrap();

        assert_eq!(
            kv.get(Namespace::Jobs, "snapshot").unwrap().as_deref(),
            Some("jobs-v2".as_bytes())
        );
        assert!(kv.get(Namespace::Users, "snapshot").unwrap().is_none());
        assert_eq!(kv.keys(Namespace::Jobs).unwrap(), vec!["snapshot"]);
        assert!(kv.keys(Namespace::Users).unwrap().is_empty());
    }

    #[test]
    fn memory_backend_puts_overwrites_and_deletes() {
        exercise(&mut MemoryKv::new());
    }

    #[test]
    fn sqlite_backend_puts_overwrites_and_deletes() {
        exercise(&mut SqliteKv::in_memory().unwrap());
    }

    #[test]
    fn snapshot_helpers_round_trip_json() {
        let mut kv = MemoryKv::new();
        let op = snapshot_op(Namespace::Audit, &vec![1u32, 2, 3]).unwrap();
        kv.write_batch(vec![op]).unwrap();

        let loaded: Option<Vec<u32>> = load_snapshot(&kv, Namespace::Audit).unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));

        let missing: Option<Vec<u32>> = load_snapshot(&kv, Namespace::Jobs).unwrap();
        assert!(missing.is_none());
    }
}
