//! relayd - metrics ingestion and routing daemon
//!
//! Accepts metric submissions over HTTP, validates and normalizes them, and
//! fans them out to the configured alerting, storage and time-series
//! backends, sharding by consistent hashing with bounded per-destination
//! buffering.
//!
//! # Usage
//!
//! ```bash
//! relayd --config relay.toml
//! relayd -c relay.toml --log-level debug
//! ```

mod serve;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use relay_config::{Config, LogFormat};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// relayd - metrics ingestion and routing daemon
#[derive(Parser, Debug)]
#[command(name = "relayd")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    config: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let level = cli
        .log_level
        .unwrap_or_else(|| config.log.level.as_str().to_string());
    init_logging(&level, config.log.format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "relayd starting"
    );

    serve::run(config).await?;

    info!("relayd shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {e}"))?;

    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }

    Ok(())
}
