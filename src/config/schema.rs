//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tunnel.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for secret-passage.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PassageConfig {
    /// Role, peer/bind address and reconnect policy.
    pub tunnel: TunnelConfig,

    /// Relay loop buffer sizes.
    pub relay: RelayConfig,

    /// TAP interface settings.
    pub tap: TapConfig,

    /// Process-level settings (pid file).
    pub service: ServiceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Which side of the tunnel this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dial out, send the POST preamble, reconnect on failure.
    #[default]
    Connect,
    /// Accept one connection at a time, answer with the 200 preamble.
    Listen,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Connect => "connect",
            Role::Listen => "listen",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunnel configuration consumed by the orchestrators.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Connect or listen.
    pub mode: Role,

    /// "host[:port]"; the port defaults to 443.
    pub address: String,

    /// Delay before the connect role retries after a failure, in milliseconds.
    pub reconnect_interval_ms: u64,

    /// Optional TLS wrapping of the transport. Absent means plaintext.
    pub tls: Option<TlsConfig>,
}

impl TunnelConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            mode: Role::Connect,
            address: "127.0.0.1:443".to_string(),
            reconnect_interval_ms: 5_000,
            tls: None,
        }
    }
}

/// TLS settings for the transport.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Certificate chain (PEM). Required for the listen role.
    pub cert_path: Option<PathBuf>,

    /// Private key (PEM). Required for the listen role.
    pub key_path: Option<PathBuf>,

    /// Trust anchors (PEM). Required for the connect role.
    pub ca_path: Option<PathBuf>,

    /// SNI override for the connect role; defaults to the address host.
    pub server_name: Option<String>,
}

/// Relay loop buffer sizes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Upper bound of a single TAP read, i.e. of one chunk's payload.
    /// Frames longer than this are truncated by the kernel.
    pub tap_read_size: usize,

    /// Upper bound of a single transport read fed to the parser.
    pub socket_read_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            tap_read_size: 512,
            socket_read_size: 512,
        }
    }
}

/// TAP interface configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TapConfig {
    /// Requested interface name (e.g. "tap0"); the kernel picks one if unset.
    pub name: Option<String>,
}

/// Process-level settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Pid file to create and lock for the process lifetime.
    pub pid_path: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Append logs to this file instead of stderr.
    pub log_path: Option<PathBuf>,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_path: None,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
