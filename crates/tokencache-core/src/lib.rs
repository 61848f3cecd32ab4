//! Client-side credential cache.
//!
//! Keeps the current authentication token in memory and mirrors it into a
//! pluggable `Storage` backend according to the user's remember-me choice.
//!
//! ```
//! use tokencache_core::{CredentialManager, TokenRecord, UserId};
//! use tokencache_core::storage::MemoryStore;
//!
//! let mut auth = CredentialManager::new(MemoryStore::new());
//! auth.set_remember_me(true);
//! auth.set_token(TokenRecord {
//!     id: Some("tok1".to_string()),
//!     ttl: Some(60),
//!     user_id: Some(UserId::Number(42)),
//!     ..TokenRecord::default()
//! });
//! assert_eq!(auth.access_token_id(), Some("tok1"));
//! ```

pub mod auth;
pub mod config;
pub mod storage;
pub mod transport;

pub use auth::{CredentialError, CredentialManager, TokenRecord, UserId, UserPayload};
pub use config::Config;
pub use storage::{Storage, StorageError, StorageKind};
pub use transport::{Channel, ConnectOptions, Connector, TcpConnector, TransportError};
