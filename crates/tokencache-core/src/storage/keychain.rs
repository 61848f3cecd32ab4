use std::collections::HashMap;

use chrono::{DateTime, Utc};
use keyring::Entry;
use tracing::debug;

use super::{Storage, StorageError, StoredEntry};

/// Storage in the OS keychain, one keyring entry per key.
///
/// Keychains have no notion of expiry, so each entry holds a JSON
/// `StoredEntry` envelope and expired envelopes read as absent. Writes
/// without an expiry never reach the keychain; they are kept in process
/// memory and replace any durable copy.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
    session: HashMap<String, String>,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            session: HashMap::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }

    /// Whether `key` is held only for this process.
    pub fn is_session(&self, key: &str) -> bool {
        self.session.contains_key(key)
    }

    fn delete_durable(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Storage for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(value) = self.session.get(key) {
            return Ok(Some(value.clone()));
        }
        let secret = match self.entry(key)?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope = decode_envelope(&secret)?;
        if envelope.is_expired() {
            debug!(key, "Keyring entry expired");
            return Ok(None);
        }
        Ok(Some(envelope.value))
    }

    fn set(
        &mut self,
        key: &str,
        value: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        if expires.is_none() {
            self.session.insert(key.to_string(), value.to_string());
            return self.delete_durable(key);
        }

        let envelope = serde_json::to_string(&StoredEntry::new(value, expires))?;
        self.entry(key)?.set_password(&envelope)?;
        self.session.remove(key);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.session.remove(key);
        self.delete_durable(key)
    }
}

fn decode_envelope(secret: &str) -> Result<StoredEntry, StorageError> {
    Ok(serde_json::from_str(secret)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn mock_store() -> KeyringStore {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        KeyringStore::new("tokencache-test")
    }

    #[test]
    fn test_envelope_round_trip() {
        let expires = Some(Utc::now() + Duration::minutes(1));
        let secret = serde_json::to_string(&StoredEntry::new("tok1", expires)).unwrap();
        let envelope = decode_envelope(&secret).unwrap();
        assert_eq!(envelope.value, "tok1");
        assert_eq!(envelope.expires, expires);
    }

    #[test]
    fn test_envelope_without_expiry_omits_field() {
        let secret = serde_json::to_string(&StoredEntry::new("tok1", None)).unwrap();
        assert_eq!(secret, r#"{"value":"tok1"}"#);
        assert!(!decode_envelope(&secret).unwrap().is_expired());
    }

    #[test]
    fn test_session_write_stays_in_memory() {
        let mut store = mock_store();
        store.set("id", "tok1", None).unwrap();

        assert!(store.is_session("id"));
        assert_eq!(store.get("id").unwrap().as_deref(), Some("tok1"));
    }

    #[test]
    fn test_remove_clears_session_entry() {
        let mut store = mock_store();
        store.set("id", "tok1", None).unwrap();
        store.remove("id").unwrap();

        assert!(!store.is_session("id"));
        assert_eq!(store.get("id").unwrap(), None);
    }

    #[test]
    fn test_garbage_envelope_is_an_error() {
        assert!(matches!(
            decode_envelope("plain password"),
            Err(StorageError::Serialization(_))
        ));
    }
}
