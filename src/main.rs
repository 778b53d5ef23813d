//! DLHub: batch download job engine
//!
//! Main entry point that wires the crates together and dispatches CLI
//! subcommands.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use dlhub_core::config::AppConfig;
use dlhub_core::error::AppError;

mod app;
mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = cli.execute(config).await {
        tracing::error!("DLHub error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` files and `DLHUB__*` variables
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("DLHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.directive()));

    if config.logging.is_json() {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
