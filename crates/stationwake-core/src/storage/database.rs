//! SQLite-backed durable state.
//!
//! A single `kv` table holds the small pieces of state that must survive
//! process restarts while the app is backgrounded -- most importantly
//! the serialized destination. Single-row upserts run as one SQLite
//! statement, which is what gives [`SqliteDestinationStore`] its
//! old-value-or-new-value atomicity.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::destination::{Destination, DestinationStore};
use crate::error::StorageError;

use super::data_dir;

const DESTINATION_KEY: &str = "destination";

/// SQLite database for durable key-value state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/stationwake/stationwake.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("stationwake.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests, ephemeral sessions).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Insert or overwrite one key as a single atomic statement.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// [`DestinationStore`] over the `kv` table.
///
/// The destination lives under one key as a JSON blob; `set` is a
/// single-row upsert, so a concurrent `get` observes either the old or
/// the new destination, never a torn one.
pub struct SqliteDestinationStore {
    db: Mutex<Database>,
}

impl SqliteDestinationStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open over the default database location.
    pub fn open() -> Result<Self, StorageError> {
        Ok(Self::new(Database::open()?))
    }
}

impl DestinationStore for SqliteDestinationStore {
    fn set(&self, destination: &Destination) -> Result<(), StorageError> {
        let json = serde_json::to_string(destination)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        self.db.lock().unwrap().kv_set(DESTINATION_KEY, &json)
    }

    fn get(&self) -> Result<Option<Destination>, StorageError> {
        let json = match self.db.lock().unwrap().kv_get(DESTINATION_KEY)? {
            Some(json) => json,
            None => return Ok(None),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }
}
