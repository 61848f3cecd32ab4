//! Storage capability for persisted credential fields.
//!
//! This module provides the `Storage` trait the credential manager writes
//! through, plus the interchangeable backends:
//!
//! - `CookieStore`: cookie jar with `Set-Cookie` style expiry
//! - `FileStore`: device-persistent JSON file
//! - `KeyringStore`: OS keychain via keyring
//! - `MemoryStore`: ephemeral in-process map
//! - `NoopStore`: environments where persistence is unavailable
//!
//! All backends are string key/value stores. Encoding of structured values
//! happens before a value reaches a backend.

pub mod cookie;
pub mod file;
pub mod keychain;
pub mod memory;
pub mod noop;

use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

pub use cookie::CookieStore;
pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;
pub use noop::NoopStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Key/value capability the credential manager persists through.
pub trait Storage {
    /// Read a value, `None` when the key is absent or expired.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value. `expires` of `None` asks for a session-only entry.
    fn set(
        &mut self,
        key: &str,
        value: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(
        &mut self,
        key: &str,
        value: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        (**self).set(key, value, expires)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// A stored value with its optional expiry instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl StoredEntry {
    pub fn new(value: &str, expires: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.to_string(),
            expires,
        }
    }

    /// Entries without an expiry never expire on their own.
    pub fn is_expired(&self) -> bool {
        self.expires.map(|at| at <= Utc::now()).unwrap_or(false)
    }
}

/// Which backend to open for the configured environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    File,
    Cookie,
    Keyring,
    None,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::File => "file",
            StorageKind::Cookie => "cookie",
            StorageKind::Keyring => "keyring",
            StorageKind::None => "none",
        }
    }
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "file" => Ok(StorageKind::File),
            "cookie" | "cookies" => Ok(StorageKind::Cookie),
            "keyring" | "keychain" => Ok(StorageKind::Keyring),
            "none" | "noop" => Ok(StorageKind::None),
            other => Err(anyhow::anyhow!("Unknown storage kind: {}", other)),
        }
    }
}

/// Open the backend selected by `config`.
pub fn open(config: &Config) -> Result<Box<dyn Storage>> {
    debug!(kind = config.storage.as_str(), "Opening credential storage");

    let storage: Box<dyn Storage> = match config.storage {
        StorageKind::Memory => Box::new(MemoryStore::new()),
        StorageKind::File => Box::new(FileStore::open(config.store_path()?)?),
        StorageKind::Cookie => Box::new(CookieStore::open(config.cookie_jar_path()?)?),
        StorageKind::Keyring => Box::new(KeyringStore::new(config.keyring_service())),
        StorageKind::None => Box::new(NoopStore),
    };
    Ok(storage)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_storage_kind_from_str() {
        assert_eq!("file".parse::<StorageKind>().unwrap(), StorageKind::File);
        assert_eq!("Cookies".parse::<StorageKind>().unwrap(), StorageKind::Cookie);
        assert_eq!("keychain".parse::<StorageKind>().unwrap(), StorageKind::Keyring);
        assert_eq!("noop".parse::<StorageKind>().unwrap(), StorageKind::None);
        assert!("redis".parse::<StorageKind>().is_err());
    }

    #[test]
    fn test_storage_kind_serde_lowercase() {
        let json = serde_json::to_string(&StorageKind::Keyring).unwrap();
        assert_eq!(json, "\"keyring\"");
        let kind: StorageKind = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(kind, StorageKind::Memory);
    }

    #[test]
    fn test_stored_entry_expiry() {
        assert!(!StoredEntry::new("a", None).is_expired());
        assert!(!StoredEntry::new("a", Some(Utc::now() + Duration::minutes(1))).is_expired());
        assert!(StoredEntry::new("a", Some(Utc::now() - Duration::seconds(1))).is_expired());
    }

    #[test]
    fn test_boxed_storage_delegates() {
        let mut storage: Box<dyn Storage> = Box::new(MemoryStore::new());
        storage.set("k", "v", None).unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_open_memory_and_none() {
        let config = Config {
            storage: StorageKind::Memory,
            ..Config::default()
        };
        let mut storage = open(&config).unwrap();
        storage.set("k", "v", None).unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));

        let config = Config {
            storage: StorageKind::None,
            ..Config::default()
        };
        let mut storage = open(&config).unwrap();
        storage.set("k", "v", None).unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_open_file_with_truncated_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("credentials.json"), "{truncated").unwrap();
        let config = Config {
            storage: StorageKind::File,
            store_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        let storage = open(&config).unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }
}
