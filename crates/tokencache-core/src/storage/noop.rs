use chrono::{DateTime, Utc};

use super::{Storage, StorageError};

/// Storage for environments without persistence (server-side rendering,
/// sandboxed hosts). Reads are always absent and writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl Storage for NoopStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(
        &mut self,
        _key: &str,
        _value: &str,
        _expires: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}
