//! secret-passage
//!
//! Tunnels Ethernet frames from a TAP interface through a long-lived HTTP
//! request/response pair using chunked transfer encoding.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                          SECRET PASSAGE                          │
//!   │                                                                  │
//!   │  ┌────────┐  frames  ┌────────────┐  chunks  ┌────────────────┐  │
//!   │  │  tap   │─────────▶│   relay    │─────────▶│      net       │──┼──▶ peer
//!   │  │ device │◀─────────│ loops+http │◀─────────│ transport(+tls)│◀─┼─── peer
//!   │  └────────┘          └─────┬──────┘          └────────────────┘  │
//!   │                            │ stop reason                         │
//!   │                            ▼                                     │
//!   │                     ┌─────────────┐                              │
//!   │                     │   tunnel    │ connect: resolve/dial/retry  │
//!   │                     │orchestrator │ listen:  accept/re-accept    │
//!   │                     └─────────────┘                              │
//!   │                                                                  │
//!   │  cross-cutting: config · lifecycle · observability               │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use secret_passage::config::loader::{parse_config, ConfigError};
use secret_passage::config::validation::validate_config;
use secret_passage::config::{PassageConfig, Role};
use secret_passage::error::StartupError;
use secret_passage::lifecycle::startup;
use secret_passage::observability::logging;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Connect,
    Listen,
}

impl From<Mode> for Role {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Connect => Role::Connect,
            Mode::Listen => Role::Listen,
        }
    }
}

/// Tunnel a TAP interface over chunked HTTP.
#[derive(Debug, Parser)]
#[command(name = "secret-passage", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dial out (connect) or accept (listen).
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Peer address (connect) or bind address (listen), "host[:port]".
    #[arg(short, long)]
    address: Option<String>,

    /// Delay before reconnecting after a failure, in milliseconds.
    #[arg(long)]
    reconnect_interval_ms: Option<u64>,

    /// Requested TAP interface name.
    #[arg(long)]
    tap_name: Option<String>,

    /// Lock and write this pid file.
    #[arg(long)]
    pid_path: Option<PathBuf>,

    /// Log level when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Append logs to this file instead of stderr.
    #[arg(long)]
    log_path: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut PassageConfig) {
        if let Some(mode) = self.mode {
            config.tunnel.mode = mode.into();
        }
        if let Some(address) = self.address {
            config.tunnel.address = address;
        }
        if let Some(interval) = self.reconnect_interval_ms {
            config.tunnel.reconnect_interval_ms = interval;
        }
        if let Some(name) = self.tap_name {
            config.tap.name = Some(name);
        }
        if let Some(path) = self.pid_path {
            config.service.pid_path = Some(path);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(path) = self.log_path {
            config.observability.log_path = Some(path);
        }
    }
}

fn load(cli: Cli) -> Result<PassageConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => parse_config(&std::fs::read_to_string(path)?)?,
        None => PassageConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load(Cli::parse())?;

    logging::init(&config.observability).map_err(|e| StartupError::Logging(e.to_string()))?;

    tracing::info!("secret-passage v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        mode = %config.tunnel.mode,
        address = %config.tunnel.address,
        reconnect_interval_ms = config.tunnel.reconnect_interval_ms,
        "Configuration loaded"
    );

    if let Err(e) = startup::run(config).await {
        tracing::error!(error = %e, "Fatal startup error");
        return Err(e.into());
    }
    Ok(())
}
