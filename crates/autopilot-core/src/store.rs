//! Shared key/value store used by several devices taking part in one run.
//!
//! The engine treats the store as an eventually consistent service: every
//! read and write is a direct round trip, nothing is cached, and the last
//! write wins. Two backends ship in-tree:
//!
//! - [`MemoryStore`]: a cloneable in-process map, so several simulated
//!   devices in one process can share it.
//! - [`RedbStore`]: a `redb` database file, so device processes on one host
//!   can share it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use redb::{Database, DatabaseError, ReadableTable, TableDefinition};
use thiserror::Error;

/// Value returned in place of a missing key.
pub const NOT_FOUND: &str = "not_found";

const ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("entries");

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Key/value operations the engine needs from the shared store.
pub trait SharedStore: Send + Sync {
    /// Returns `Ok(None)` when the key has never been written.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Every entry whose key starts with `prefix`, in key order.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut found: Vec<(String, String)> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        found.sort();
        Ok(found)
    }
}

/// Store backed by a `redb` file.
///
/// The database is opened for each operation and closed again, so several
/// processes can take turns on the same file. An open that finds the file
/// locked by another process is retried briefly.
#[derive(Debug, Clone)]
pub struct RedbStore {
    path: PathBuf,
}

const OPEN_RETRIES: u32 = 50;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(5);

impl RedbStore {
    /// Opens or creates the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            path: path.to_path_buf(),
        };
        let db = store.database()?;
        let wt = db
            .begin_write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        wt.open_table(ENTRIES)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        wt.commit()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn database(&self) -> Result<Database, StoreError> {
        let mut attempt = 0;
        loop {
            match Database::create(&self.path) {
                Ok(db) => return Ok(db),
                Err(DatabaseError::DatabaseAlreadyOpen) if attempt < OPEN_RETRIES => {
                    attempt += 1;
                    std::thread::sleep(OPEN_RETRY_DELAY);
                }
                Err(e) => return Err(StoreError::Database(e.to_string())),
            }
        }
    }
}

impl SharedStore for RedbStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let db = self.database()?;
        let rt = db
            .begin_read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let table = rt
            .open_table(ENTRIES)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let value = table
            .get(key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let db = self.database()?;
        let wt = db
            .begin_write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        {
            let mut table = wt
                .open_table(ENTRIES)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let db = self.database()?;
        let rt = db
            .begin_read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let table = rt
            .open_table(ENTRIES)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut found = Vec::new();
        for entry in table
            .range(prefix..)
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            let (k, v) = entry.map_err(|e| StoreError::Database(e.to_string()))?;
            let key = k.value();
            if !key.starts_with(prefix) {
                break;
            }
            found.push((key.to_string(), v.value().to_string()));
        }
        Ok(found)
    }
}
