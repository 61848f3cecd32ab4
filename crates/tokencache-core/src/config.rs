//! Application configuration management.
//!
//! This module handles loading the configuration, which selects
//! the storage backend, the key prefix and where file-based stores live.
//!
//! Configuration is stored at `~/.config/tokencache/config.json`. The
//! `TOKENCACHE_STORAGE` and `TOKENCACHE_PREFIX` environment variables
//! override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_KEY_PREFIX;
use crate::storage::StorageKind;

/// Application name used for config/cache directory paths and the keyring
/// service name
const APP_NAME: &str = "tokencache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// File store name inside the cache directory
const STORE_FILE: &str = "credentials.json";

/// Cookie jar name inside the cache directory
const COOKIE_JAR_FILE: &str = "cookies.txt";

const STORAGE_ENV: &str = "TOKENCACHE_STORAGE";
const PREFIX_ENV: &str = "TOKENCACHE_PREFIX";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub key_prefix: Option<String>,
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(
            std::env::var(STORAGE_ENV).ok(),
            std::env::var(PREFIX_ENV).ok(),
        )?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides, ignoring empty values.
    pub fn apply_overrides(&mut self, storage: Option<String>, prefix: Option<String>) -> Result<()> {
        if let Some(storage) = storage.filter(|s| !s.trim().is_empty()) {
            self.storage = storage
                .parse()
                .with_context(|| format!("Invalid {}", STORAGE_ENV))?;
        }
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            self.key_prefix = Some(prefix);
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(STORE_FILE))
    }

    pub fn cookie_jar_path(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(COOKIE_JAR_FILE))
    }

    pub fn keyring_service(&self) -> &'static str {
        APP_NAME
    }

    pub fn key_prefix(&self) -> &str {
        self.key_prefix.as_deref().unwrap_or(DEFAULT_KEY_PREFIX)
    }
}
