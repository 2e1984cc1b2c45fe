//! Metrics collection and exposition.
//!
//! # Metrics
//! - `passage_connections_total{role}` (counter): transports connected or accepted
//! - `passage_loop_stops_total{reason}` (counter): relay stop reasons consumed
//! - `passage_reconnects_total` (counter): reconnect timers armed
//! - `passage_bytes_total{direction}` (counter): payload bytes relayed

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::config::Role;
use crate::relay::LoopStopReason;

/// Relay direction label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TapToHttp,
    HttpToTap,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::TapToHttp => "tap_to_http",
            Direction::HttpToTap => "http_to_tap",
        }
    }
}

/// Install the Prometheus recorder and serve it on `addr`. Must be called
/// from within the runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection(role: Role) {
    counter!("passage_connections_total", "role" => role.as_str()).increment(1);
}

pub fn record_loop_stop(reason: LoopStopReason) {
    counter!("passage_loop_stops_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_reconnect() {
    counter!("passage_reconnects_total").increment(1);
}

pub fn record_bytes(direction: Direction, bytes: usize) {
    counter!("passage_bytes_total", "direction" => direction.as_str()).increment(bytes as u64);
}
