//! Durable storage for the hourly log.
//!
//! The log is kept under one fixed key in a small string-keyed store. The
//! whole sequence is rewritten on every change; readers never see a partial
//! payload because file writes go through a temp file and an atomic rename.

use crate::models::{HourlyLogEntry, LogSequence};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::{HOUR_MS, MAX_LOG_ENTRIES};

/// Default key the hourly log is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "hashpulse_history_logs";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal string-keyed text store.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the value stored under `key`.
    fn put(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// One JSON file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        // Same directory so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The hourly log, persisted under one fixed key.
pub struct PersistentLogStore {
    backend: Box<dyn KeyValueStore>,
    key: String,
}

impl PersistentLogStore {
    pub fn new(backend: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Log store on top of an in-memory backend.
    #[allow(dead_code)] // Convenience for tests
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), DEFAULT_STORAGE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted log.
    ///
    /// Missing, unreadable or malformed payloads all yield an empty sequence;
    /// the failure is only logged.
    pub fn load(&self) -> LogSequence {
        let payload = match self.backend.get(&self.key) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("No stored history under '{}'", self.key);
                return LogSequence::new();
            }
            Err(e) => {
                warn!("Failed to read history logs: {}", e);
                return LogSequence::new();
            }
        };

        match serde_json::from_str::<LogSequence>(&payload) {
            Ok(logs) if !is_hourly_ordered(&logs) => {
                warn!("Stored history logs are out of order, starting empty");
                LogSequence::new()
            }
            Ok(mut logs) => {
                if logs.len() > MAX_LOG_ENTRIES {
                    let excess = logs.len() - MAX_LOG_ENTRIES;
                    logs.drain(..excess);
                    debug!("Trimmed {} stored entries beyond retention", excess);
                }
                logs
            }
            Err(e) => {
                warn!("Failed to parse history logs, starting empty: {}", e);
                LogSequence::new()
            }
        }
    }

    /// Replace the persisted log with `logs`. Write failures are logged only.
    pub fn save(&self, logs: &LogSequence) {
        if let Err(e) = self.try_save(logs) {
            warn!(
                "Failed to persist history logs ({} entries kept in memory only): {}",
                logs.len(),
                e
            );
        }
    }

    fn try_save(&self, logs: &LogSequence) -> StoreResult<()> {
        let payload = serde_json::to_string(logs)?;
        self.backend.put(&self.key, &payload)
    }
}

/// Oldest first, with consecutive samples at least an hour apart.
fn is_hourly_ordered(logs: &[HourlyLogEntry]) -> bool {
    logs.windows(2)
        .all(|pair| pair[1].timestamp - pair[0].timestamp >= HOUR_MS)
}
