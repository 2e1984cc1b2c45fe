//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (interval > 0, buffer sizes > 0, ports valid)
//! - Check that the TLS section carries what the selected role needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PassageConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{PassageConfig, Role};
use crate::net::address::HostPort;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &PassageConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let tunnel = &config.tunnel;

    if tunnel.address.trim().is_empty() {
        errors.push(ValidationError::new("tunnel.address", "must not be empty"));
    } else {
        let hp = HostPort::split(&tunnel.address);
        if hp.host.is_empty() {
            errors.push(ValidationError::new("tunnel.address", "host part is empty"));
        }
        if hp.port_number().is_none() {
            errors.push(ValidationError::new(
                "tunnel.address",
                format!("port '{}' is not a valid TCP port", hp.port),
            ));
        }
    }

    if tunnel.reconnect_interval_ms == 0 {
        errors.push(ValidationError::new(
            "tunnel.reconnect_interval_ms",
            "must be greater than zero",
        ));
    }

    if let Some(tls) = &tunnel.tls {
        match tunnel.mode {
            Role::Listen => {
                if tls.cert_path.is_none() {
                    errors.push(ValidationError::new(
                        "tunnel.tls.cert_path",
                        "required when listening with TLS",
                    ));
                }
                if tls.key_path.is_none() {
                    errors.push(ValidationError::new(
                        "tunnel.tls.key_path",
                        "required when listening with TLS",
                    ));
                }
            }
            Role::Connect => {
                if tls.ca_path.is_none() {
                    errors.push(ValidationError::new(
                        "tunnel.tls.ca_path",
                        "required when connecting with TLS",
                    ));
                }
            }
        }
    }

    if config.relay.tap_read_size == 0 {
        errors.push(ValidationError::new("relay.tap_read_size", "must be greater than zero"));
    }
    if config.relay.socket_read_size == 0 {
        errors.push(ValidationError::new("relay.socket_read_size", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
