//! Credential manager holding the current authentication token.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::CredentialError;
use super::token::{TokenField, TokenRecord, UserId, UserPayload};
use crate::storage::{Storage, StorageError};

/// Prefix for every stored key, shared with existing browser SDK clients.
pub const DEFAULT_KEY_PREFIX: &str = "$LoopBackSDK$";

/// A storage write or removal that failed and was skipped.
#[derive(Debug)]
pub struct PersistFailure {
    pub key: String,
    pub error: StorageError,
}

/// Owns the in-memory `TokenRecord` and mirrors it into `storage`.
///
/// Construction loads every field from storage before the manager is
/// handed out. Every mutation re-persists all fields: durably with an
/// expiry of `now + ttl` when remember-me is on, session-only otherwise.
/// Absent fields are removed from storage rather than written.
/// Storage failures never reach callers; they are logged and published to
/// subscribers of [`CredentialManager::subscribe_failures`].
pub struct CredentialManager<S: Storage> {
    storage: S,
    token: TokenRecord,
    prefix: String,
    failures: Option<mpsc::UnboundedSender<PersistFailure>>,
}

impl<S: Storage> CredentialManager<S> {
    /// Create a manager over `storage` using the default key prefix.
    pub fn new(storage: S) -> Self {
        Self::with_prefix(storage, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(storage: S, prefix: impl Into<String>) -> Self {
        let mut manager = Self {
            storage,
            token: TokenRecord::default(),
            prefix: prefix.into(),
            failures: None,
        };
        for field in TokenField::ALL {
            manager.load(field);
        }
        debug!(
            prefix = %manager.prefix,
            has_token = manager.token.id.is_some(),
            "Credentials loaded from storage"
        );
        manager
    }

    fn key(&self, field: TokenField) -> String {
        format!("{}{}", self.prefix, field.name())
    }

    fn load(&mut self, field: TokenField) {
        let key = self.key(field);
        match self.storage.get(&key) {
            Ok(Some(text)) => {
                if !self.token.apply_stored(field, &text) {
                    warn!(key = %key, "Ignoring unreadable stored credential field");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Failed to read stored credential field"),
        }
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Set the remember-me flag. Takes effect on the next save.
    pub fn set_remember_me(&mut self, value: bool) {
        self.token.remember_me = Some(value);
    }

    /// Replace the user payload and save.
    pub fn set_user(&mut self, user: impl Into<UserPayload>) {
        self.token.user = Some(user.into());
        self.save();
    }

    /// Shallow-merge `token` over the current record and save.
    pub fn set_token(&mut self, token: TokenRecord) {
        self.token.merge(token);
        self.save();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn token(&self) -> &TokenRecord {
        &self.token
    }

    /// The access token id to attach to outgoing requests.
    pub fn access_token_id(&self) -> Option<&str> {
        self.token.id.as_deref()
    }

    pub fn current_user_id(&self) -> Option<&UserId> {
        self.token.user_id.as_ref()
    }

    /// The user payload as a structured value.
    ///
    /// A serialized payload that is not valid JSON is an error; there is no
    /// fallback for corrupted user data.
    pub fn current_user_data(&self) -> Result<Option<Value>, CredentialError> {
        match self.token.user {
            Some(ref user) => Ok(Some(user.decode()?)),
            None => Ok(None),
        }
    }

    pub fn remembers(&self) -> bool {
        self.token.remember_me == Some(true)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Give the backend back, e.g. to reopen it with a new manager.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Receive every persistence failure from now on. A later call replaces
    /// the previous subscriber.
    pub fn subscribe_failures(&mut self) -> mpsc::UnboundedReceiver<PersistFailure> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.failures = Some(tx);
        rx
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write all six fields to storage, removing the keys of absent ones.
    /// Always returns `true`; individual
    /// field failures are reported, not returned.
    pub fn save(&mut self) -> bool {
        let expires = self
            .token
            .ttl
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));

        for field in TokenField::ALL {
            self.persist(field, expires);
        }
        debug!(remember_me = self.remembers(), "Credentials saved");
        true
    }

    fn persist(&mut self, field: TokenField, expires: Option<DateTime<Utc>>) {
        let key = self.key(field);
        let expires = if self.remembers() { expires } else { None };

        let result = match self.token.encode_field(field) {
            Ok(Some(value)) => self.storage.set(&key, &value, expires),
            Ok(None) => self.storage.remove(&key),
            Err(e) => Err(e.into()),
        };
        if let Err(error) = result {
            self.report(key, error);
        }
    }

    /// Remove every stored field and reset to an empty record.
    pub fn clear(&mut self) {
        for field in TokenField::ALL {
            let key = self.key(field);
            if let Err(error) = self.storage.remove(&key) {
                self.report(key, error);
            }
        }
        self.token = TokenRecord::default();
        debug!("Credentials cleared");
    }

    fn report(&self, key: String, error: StorageError) {
        warn!(key = %key, error = %error, "Cannot access credential storage");
        if let Some(ref tx) = self.failures {
            // A dropped receiver just means nobody is listening
            let _ = tx.send(PersistFailure { key, error });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
