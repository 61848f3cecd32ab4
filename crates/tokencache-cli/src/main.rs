//! tokencache - command line front end for the credential cache.
//!
//! Loads configuration, opens the configured storage backend and runs one
//! command against the credential manager.

mod cli;
mod commands;
mod format;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tokencache_core::storage::{self, MemoryStore, Storage};
use tokencache_core::{Config, CredentialManager};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Args;

/// Initialize the tracing subscriber for logging.
/// The returned guard must be held until exit so file logs are flushed.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _guard = init_tracing(args.log_file.as_deref())?;
    debug!("tokencache starting");

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(kind) = args.storage {
        config.storage = kind;
    }
    debug!(storage = config.storage.as_str(), "Config loaded");

    let backend: Box<dyn Storage> = match storage::open(&config) {
        Ok(backend) => backend,
        Err(e) => {
            warn!(error = %e, "Failed to open credential storage, keeping credentials in memory");
            eprintln!("Warning: credentials will not be persisted: {:#}", e);
            Box::new(MemoryStore::new())
        }
    };
    let mut auth = CredentialManager::with_prefix(backend, config.key_prefix());
    let mut failures = auth.subscribe_failures();

    let result = commands::run(args.command, &mut auth).await;

    while let Ok(failure) = failures.try_recv() {
        eprintln!(
            "Warning: could not persist {}: {}",
            failure.key, failure.error
        );
    }

    info!("tokencache done");
    result
}
