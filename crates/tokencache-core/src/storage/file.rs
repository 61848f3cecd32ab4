//! Device-persistent storage backed by a JSON file.
//!
//! Entries written with an expiry are durable and flushed to disk on every
//! change. Entries written without one are session-only: they live in
//! process memory and are gone when the store is dropped.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{Storage, StorageError, StoredEntry};

pub struct FileStore {
    path: PathBuf,
    durable: BTreeMap<String, StoredEntry>,
    session: HashMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`, loading any unexpired durable entries.
    ///
    /// A file that cannot be parsed is treated as empty and replaced on the
    /// next durable write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut durable: BTreeMap<String, StoredEntry> = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "Discarding unreadable credential file");
                    BTreeMap::new()
                })
            }
        } else {
            BTreeMap::new()
        };

        let before = durable.len();
        durable.retain(|_, entry| !entry.is_expired());
        debug!(
            path = %path.display(),
            entries = durable.len(),
            expired = before - durable.len(),
            "File store opened"
        );

        Ok(Self {
            path,
            durable,
            session: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `key` is held durably (on disk) rather than for the session.
    pub fn is_durable(&self, key: &str) -> bool {
        self.durable.contains_key(key)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.durable.retain(|_, entry| !entry.is_expired());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.durable)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl Storage for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(value) = self.session.get(key) {
            return Ok(Some(value.clone()));
        }
        Ok(self
            .durable
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    fn set(
        &mut self,
        key: &str,
        value: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        match expires {
            Some(_) => {
                self.session.remove(key);
                self.durable
                    .insert(key.to_string(), StoredEntry::new(value, expires));
                self.flush()
            }
            None => {
                self.session.insert(key.to_string(), value.to_string());
                // A session-only write replaces any durable copy
                if self.durable.remove(key).is_some() {
                    self.flush()?;
                }
                Ok(())
            }
        }
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.session.remove(key);
        if self.durable.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
