//! Storefront CLI - a terminal client for the storefront API.
//!
//! Every run restores the saved session first, then executes one command.
//! The request pipeline reports an unrecoverable session as
//! `ApiError::SessionExpired`; this binary turns that into a prompt to log
//! in again.

mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storefront_core::{Config, SessionClient};

use commands::{Cli, Command};

/// Log file name prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "storefront.log";

/// Initialize the tracing subscriber for logging
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(base) = cli.api_base.clone() {
        config.api_base = base;
    }

    let log_guard = init_tracing(&config);
    info!(api_base = %config.api_base, "Storefront CLI starting");

    let store = config.credential_store()?;
    let client = SessionClient::new(&config, store)?;
    client.bootstrap().await;

    let command = cli.command.unwrap_or(Command::Whoami);
    if let Err(e) = commands::run(&mut config, &client, command).await {
        if commands::is_session_expired(&e) {
            eprintln!("Session expired. Please log in again with `storefront login`.");
        } else {
            eprintln!("Error: {}", e);
        }
        // Flush buffered log lines before exiting
        drop(log_guard);
        std::process::exit(1);
    }

    Ok(())
}
