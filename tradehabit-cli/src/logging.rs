//! Logging setup for the CLI.
//!
//! - `RUST_LOG`: standard tracing filter (e.g. `info`, `tradehabit_core=debug`)
//! - `LOG_FORMAT`: `pretty` (default), `compact` or `json`; `--log-format` wins
//!
//! Logs go to stderr so reports printed on stdout stay machine-readable.

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use std::env;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Multi-line, human-readable
    #[default]
    Pretty,
    /// Single line per event
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT`, if set to a known value.
    pub fn from_env() -> Option<Self> {
        env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| <Self as ValueEnum>::from_str(s.trim(), true).ok())
    }
}

pub fn init_logging(format: LogFormat, default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
