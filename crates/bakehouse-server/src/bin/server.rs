//! Bakehouse Server Binary

use anyhow::{Context, Result};
use bakehouse_common_log::{LogConfig, LogFormat, LogLevel};
use bakehouse_server::{config::load_config, Server};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Bakehouse activity collection server
#[derive(Debug, Parser)]
#[command(name = "bakehouse-server", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "BAKEHOUSE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = load_config(args.config)?;

    // Config file values first; BAKEHOUSE_LOG_* variables win when set.
    let mut log_config = LogConfig::default()
        .with_level(LogLevel::parse(&config.logging.level).unwrap_or_default())
        .with_format(LogFormat::parse(&config.logging.format));
    let env_log = LogConfig::from_env();
    if std::env::var_os("BAKEHOUSE_LOG_LEVEL").is_some() || std::env::var_os("RUST_LOG").is_some() {
        log_config.level = env_log.level;
    }
    if std::env::var_os("BAKEHOUSE_LOG_FORMAT").is_some() {
        log_config.format = env_log.format;
    }
    log_config.file_path = env_log.file_path;
    log_config.source_location = env_log.source_location;
    log_config.span_events = env_log.span_events;
    bakehouse_common_log::init(log_config).context("Failed to initialize logging")?;

    info!("Starting Bakehouse Server v{}", env!("CARGO_PKG_VERSION"));

    let server = Server::new(config)?;
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}
