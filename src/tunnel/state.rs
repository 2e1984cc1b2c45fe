//! Orchestrator state reporting.
//!
//! Transitions are always logged at trace level. When a reporter channel is
//! attached (tests, embedding applications) every transition is also sent
//! there, in order.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::relay::LoopStopReason;

/// Observable orchestrator transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelState {
    // connect role
    Resolving,
    Connecting(SocketAddr),
    ConnectFailed(SocketAddr),
    Connected(SocketAddr),
    WritingPreamble,
    ReconnectWait(Duration),

    // listen role
    Listening(SocketAddr),
    Accepting,
    Accepted(SocketAddr),
    AwaitingRequest,

    // both
    Relaying,
    RelayStopped(LoopStopReason),
    TeardownPending,
    Stopped,
}

#[derive(Debug, Clone, Default)]
pub struct StateReporter {
    tx: Option<mpsc::UnboundedSender<TunnelState>>,
}

impl StateReporter {
    pub fn new(tx: mpsc::UnboundedSender<TunnelState>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn report(&self, state: TunnelState) {
        tracing::trace!(state = ?state, "State transition");
        if let Some(tx) = &self.tx {
            let _ = tx.send(state);
        }
    }
}
