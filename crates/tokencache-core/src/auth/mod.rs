//! Authentication token lifecycle.
//!
//! This module provides:
//! - `TokenRecord`: the six persisted token fields
//! - `CredentialManager`: the single authoritative holder of the current
//!   token, mirrored into a `Storage` backend when remember-me is enabled
//!
//! Stored keys are namespaced with a fixed prefix (`$LoopBackSDK$` unless
//! configured otherwise) followed by the field name.

pub mod error;
pub mod manager;
pub mod token;

pub use error::CredentialError;
pub use manager::{CredentialManager, PersistFailure, DEFAULT_KEY_PREFIX};
pub use token::{TokenField, TokenRecord, UserId, UserPayload};
