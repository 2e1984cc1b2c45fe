//! Relay loops: the two directional copy engines of a tunnel connection.
//!
//! # Data Flow
//! ```text
//! http_to_tap (inbound):  transport read → HttpParser → complete chunk → TAP write
//!                                          └─ headers gate opens ──┐
//! tap_to_http (outbound): TAP read → ChunkFrame → transport write ◀┘
//! ```
//!
//! # Design Decisions
//! - Loops never retry and never call each other; they report the first
//!   failure on a [`StopSignal`] and return
//! - `OpError::Aborted` means the orchestrator is already tearing down, so a
//!   loop returns quietly without reporting anything
//! - The outbound loop starts only after the inbound parser has accepted the
//!   peer's preamble

pub mod gate;
pub mod http_to_tap;
pub mod tap_to_http;

use std::fmt;

use tokio::sync::mpsc;

pub use gate::HeaderGate;
pub use http_to_tap::http_to_tap;
pub use tap_to_http::tap_to_http;

/// Why a relay loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopStopReason {
    SocketReadError,
    SocketWriteError,
    /// Malformed HTTP or chunk framing, or a rejected preamble.
    RequestParsingError,
    TapReadError,
    TapWriteError,
}

impl LoopStopReason {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStopReason::SocketReadError => "socket_read_error",
            LoopStopReason::SocketWriteError => "socket_write_error",
            LoopStopReason::RequestParsingError => "request_parsing_error",
            LoopStopReason::TapReadError => "tap_read_error",
            LoopStopReason::TapWriteError => "tap_write_error",
        }
    }
}

impl fmt::Display for LoopStopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().replace('_', " "))
    }
}

/// Sending side of a connection's stop channel. Both loops hold one.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: mpsc::UnboundedSender<LoopStopReason>,
}

impl StopSignal {
    /// A fresh channel for one connection cycle.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LoopStopReason>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn stop(&self, reason: LoopStopReason) {
        tracing::debug!(reason = %reason, "Relay loop stopping");
        // The receiver is gone only if the cycle was already dropped.
        let _ = self.tx.send(reason);
    }
}
