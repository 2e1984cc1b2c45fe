//! Span constructors shared by the orchestrators.

use tracing::Span;

use crate::config::Role;
use crate::net::connection::ConnectionId;

/// Outer span for one orchestrator's lifetime.
pub fn tunnel_span(role: Role, address: &str) -> Span {
    tracing::info_span!("tunnel", role = %role, address = %address)
}

/// Span for one connect/accept cycle.
pub fn connection_span(id: ConnectionId) -> Span {
    tracing::debug_span!("connection", id = %id)
}
