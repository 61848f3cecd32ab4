//! In-process storage with no durability.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{Storage, StorageError, StoredEntry};

/// Ephemeral key/value map. Honours expiry on read.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, StoredEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry lookup, including expired entries.
    pub fn entry(&self, key: &str) -> Option<&StoredEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
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
        self.entries
            .insert(key.to_string(), StoredEntry::new(value, expires));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_set_get_remove() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());

        store.set("a", "1", None).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.len(), 1);

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        // Removing twice is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn test_expired_entry_reads_absent() {
        let mut store = MemoryStore::new();
        let past = Utc::now() - Duration::seconds(5);
        store.set("a", "1", Some(past)).unwrap();

        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.entry("a").unwrap().expires, Some(past));
    }
}
