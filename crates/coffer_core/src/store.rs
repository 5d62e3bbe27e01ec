use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};

/// One write in an ordered batch applied by [`Store::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    Put { key: String, value: String },
    Delete { key: String },
}

impl KvWrite {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Serialize `value` as JSON and wrap it in a `Put`.
    pub fn put_json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize store value")?;
        Ok(Self::put(key, json))
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Embedded key/value store backed by a single SQLite table.
///
/// The connection sits behind a mutex so one `Store` can be shared (via
/// `Arc`) between the vault, the synchronizer and the pending-tx poller.
/// Every batch runs inside one SQLite transaction.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) the database at the given path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;

        // Restrict file permissions to owner-only on Unix (0o600 = rw-------).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set database file permissions")?;
        }

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("Store opened at {}", path.display());
        Ok(store)
    }

    /// Opens an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Read the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        read(&conn, key)
    }

    /// Read and deserialize a JSON value stored under `key`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse stored value for '{key}'"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Whether a value exists under `key`.
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply an ordered batch of writes atomically.
    ///
    /// Writes are executed in slice order within one transaction; either all
    /// of them land or none do.
    pub fn apply(&self, writes: &[KvWrite]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("Failed to begin store transaction")?;
        for write in writes {
            match write {
                KvWrite::Put { key, value } => {
                    tx.execute(
                        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                        updated_at = excluded.updated_at",
                        params![key, value, chrono::Utc::now().to_rfc3339()],
                    )
                    .with_context(|| format!("Failed to write '{key}'"))?;
                }
                KvWrite::Delete { key } => {
                    tx.execute("DELETE FROM kv WHERE key = ?1", params![key])
                        .with_context(|| format!("Failed to delete '{key}'"))?;
                }
            }
        }
        tx.commit().context("Failed to commit store transaction")?;
        debug!(
            writes = writes.len(),
            keys = ?writes.iter().map(KvWrite::key).collect::<Vec<_>>(),
            "store batch applied"
        );
        Ok(())
    }

    /// Convenience for a single `Put`.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.apply(&[KvWrite::put(key, value)])
    }

    /// Convenience for a single JSON `Put`.
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.apply(&[KvWrite::put_json(key, value)?])
    }

    /// Convenience for a single `Delete`.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.apply(&[KvWrite::delete(key)])
    }

    /// Read-modify-write of one JSON value while holding the connection lock.
    ///
    /// `f` receives the current value (or `T::default()` when absent) and
    /// returns whatever the caller needs back. The mutated value is written
    /// in the same transaction as the read.
    pub fn update_json<T, R, F>(&self, key: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("Failed to begin store transaction")?;

        let mut value: T = match read(&tx, key)? {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse stored value for '{key}'"))?,
            None => T::default(),
        };
        let result = f(&mut value);

        let json = serde_json::to_string(&value).context("Failed to serialize store value")?;
        tx.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            params![key, json, chrono::Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("Failed to write '{key}'"))?;
        tx.commit().context("Failed to commit store transaction")?;
        Ok(result)
    }
}

fn read(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get::<_, String>(0)
    })
    .optional()
    .with_context(|| format!("Failed to read '{key}'"))
}
