//! Clap config
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokencache_core::StorageKind;

/// tokencache - cached client credentials with remember-me persistence.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Storage backend: memory, file, cookie, keyring or none
    /// (default: from config, then "file")
    #[arg(long, global = true)]
    pub storage: Option<StorageKind>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the cached token
    Show,

    /// Cache an access token
    Login {
        /// Access token id (prompted for when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Authenticated user id, numeric or text
        #[arg(long)]
        user_id: Option<String>,

        /// Token lifetime in seconds
        #[arg(long, default_value_t = crate::commands::DEFAULT_TTL_SECS)]
        ttl: i64,

        /// Issuance time (default: now)
        #[arg(long)]
        created: Option<String>,

        /// Login response JSON merged over the other fields
        #[arg(long)]
        response: Option<String>,

        /// Keep the credentials after this process exits
        #[arg(long)]
        remember: bool,
    },

    /// Read or replace the cached user
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Forget the cached token
    Clear,

    /// Open a channel to ADDRESS using the cached access token
    Connect {
        /// host:port to connect to
        address: String,

        /// Connect timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// JSON message to send once connected
        #[arg(long)]
        message: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Print the cached user as JSON
    Show,

    /// Replace the cached user
    Set {
        /// User data as JSON
        user: String,

        /// Keep the credentials after this process exits
        #[arg(long)]
        remember: bool,
    },
}
