//! Account rotation admin tool
//!
//! Operator CLI over the rotation manager:
//! 1. Loads configuration (store path, rotation windows, fallback credential)
//! 2. Restores the account document, or seeds from the fallback credential
//! 3. Runs one command and prints its JSON result on stdout
//!
//! Logs go to stderr as JSON so stdout stays machine-readable.

mod cli;
mod config;
mod error;

use std::path::Path;
use std::sync::Arc;

use account_rotation::{RotationManager, SystemClock};
use account_store::AccountStore;
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, DEFAULT_CONFIG_FILE};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match cli::parse(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{e}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let config = match Config::explicit_path(invocation.config_path.as_deref()) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_optional(Path::new(DEFAULT_CONFIG_FILE))
            .with_context(|| format!("failed to load config from {DEFAULT_CONFIG_FILE}"))?,
    };

    let store_path = config.store_path()?;
    let fallback = config.fallback_credential()?;
    info!(
        store = %store_path.display(),
        fallback = fallback.is_some(),
        command = invocation.command.name(),
        "configuration loaded"
    );

    let store = Arc::new(AccountStore::new(store_path));
    let clock = Arc::new(SystemClock);
    let manager = RotationManager::from_store(
        store,
        fallback.as_ref(),
        clock.clone(),
        config.rotation_config(),
    )
    .await;

    let output = cli::run(&manager, clock.as_ref(), invocation.command)
        .await
        .context("command failed")?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
