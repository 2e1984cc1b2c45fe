//! Error types shared across the tunnel.
//!
//! # Taxonomy
//! ```text
//! OpError       one Transport/TAP operation: Aborted | Io
//! TunnelError   non-fatal, ends one connection cycle (teardown + retry)
//! StartupError  fatal, aborts the process before any orchestrator runs
//! ```

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::relay::LoopStopReason;

/// Outcome of a single cancellable I/O operation.
#[derive(Debug, Error)]
pub enum OpError {
    /// The operation was cancelled by a teardown already in progress.
    #[error("operation aborted")]
    Aborted,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl OpError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, OpError::Aborted)
    }
}

/// Failures that end the current connection cycle.
///
/// None of these are fatal: the owning orchestrator tears the connection
/// down and either re-accepts (listen) or arms the reconnect timer (connect).
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to resolve '{host}:{port}': {source}")]
    Resolution {
        host: String,
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("could not connect to any of {attempted} endpoint(s) for '{host}:{port}'")]
    Connection {
        host: String,
        port: String,
        attempted: usize,
    },

    #[error("failed to write preamble to {peer}: {source}")]
    PreambleWrite {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("transport is not connected")]
    NotConnected,

    #[error("relay stopped: {0}")]
    Relay(LoopStopReason),

    /// Every loop ended on an aborted completion without reporting a reason.
    #[error("relay aborted")]
    Aborted,
}

/// Errors that abort the process before relaying starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to resolve listen address '{address}': {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("listen address '{0}' resolved to no endpoints")]
    NoAddress(String),

    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to listen on {endpoint}: {source}")]
    Listen {
        endpoint: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("TAP device error: {0}")]
    Tap(#[source] io::Error),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("pid file '{path}': {message}")]
    PidFile { path: String, message: String },

    #[error("metrics exporter: {0}")]
    Metrics(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("signal handler registration failed: {0}")]
    Signals(#[source] io::Error),
}
