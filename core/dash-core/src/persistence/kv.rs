//! Key/value stores backing client-side session persistence.
//!
//! [`FileStore`] is the durable store: one JSON file shared by every client
//! process on the machine, so a logout in one process is visible to the next
//! read in any other. It re-reads the file on every access and never caches.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": { "token": "...", "user": "{...}", "logout": "1700000000000" }
//! }
//! ```
//!
//! # Defensive Design
//!
//! - Missing, empty or corrupt files read as an empty store (corruption is logged)
//! - Unknown versions read as an empty store
//! - Writes go to a temp file and are renamed into place
//! - A batched [`KeyValueStore::apply`] is one read and one rename, so the keys
//!   of a login or logout change together

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::PersistError;

const FILE_VERSION: u32 = 1;

/// One change in a batched write: `Some` sets the key, `None` removes it.
pub type Change<'a> = (&'a str, Option<&'a str>);

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistError>;

    /// Applies `changes` in order.
    ///
    /// The default attempts every change even after one fails, and returns
    /// the first error. Stores that can write several keys at once override
    /// this so the batch lands together or not at all.
    fn apply(&mut self, changes: &[Change<'_>]) -> Result<(), PersistError> {
        let mut first_err = None;
        for (key, value) in changes {
            let result = match value {
                Some(value) => self.set(key, value),
                None => self.remove(key),
            };
            if let Err(err) = result {
                warn!(key = %key, error = %err, "Client storage write failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Process-local store, for tests and clients that should not touch disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: HashMap<String, String>,
}

impl Default for StoreFile {
    fn default() -> Self {
        StoreFile {
            version: FILE_VERSION,
            entries: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(err) => {
                warn!(error = %err, "Failed to read client storage, treating as empty");
                return HashMap::new();
            }
        };

        if content.trim().is_empty() {
            return HashMap::new();
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(file) if file.version == FILE_VERSION => file.entries,
            Ok(file) => {
                warn!(
                    version = file.version,
                    expected = FILE_VERSION,
                    "Unsupported client storage version, treating as empty"
                );
                HashMap::new()
            }
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "Corrupt client storage, treating as empty");
                HashMap::new()
            }
        }
    }

    fn save(&self, entries: HashMap<String, String>) -> Result<(), PersistError> {
        let file = StoreFile {
            version: FILE_VERSION,
            entries,
        };
        let content =
            serde_json::to_string_pretty(&file).map_err(|source| PersistError::Json {
                context: "serialize client storage".to_string(),
                source,
            })?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|source| PersistError::Io {
            context: format!("create {}", parent.display()),
            source,
        })?;

        let io_err = |context: &str, source: std::io::Error| PersistError::Io {
            context: format!("{} {}", context, self.path.display()),
            source,
        };
        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| io_err("create temp for", e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| io_err("write temp for", e))?;
        temp.flush().map_err(|e| io_err("flush temp for", e))?;
        temp.persist(&self.path)
            .map_err(|e| io_err("replace", e.error))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        let mut entries = self.load();
        if entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        entries.insert(key.to_string(), value.to_string());
        self.save(entries)
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        let mut entries = self.load();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(entries)
    }

    fn apply(&mut self, changes: &[Change<'_>]) -> Result<(), PersistError> {
        let mut entries = self.load();
        let mut changed = false;
        for (key, value) in changes {
            changed |= match value {
                Some(value) => {
                    entries.insert(key.to_string(), value.to_string()).as_deref() != Some(*value)
                }
                None => entries.remove(*key).is_some(),
            };
        }
        if !changed {
            return Ok(());
        }
        self.save(entries)
    }
}
