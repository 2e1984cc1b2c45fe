//! Role orchestrators.
//!
//! # Data Flow
//! ```text
//! connect.rs: resolve → connect (endpoints in order) → POST preamble ─┐
//! listen.rs:  accept ─────────────────────────────────────────────────┤
//!                                                                     ▼
//! session.rs: inbound loop (parse peer preamble) → gate → outbound loop
//!             first stop reason → cancel both → teardown → retry
//! ```
//!
//! # Design Decisions
//! - Each orchestrator exclusively owns its transport, TAP handle and parser
//! - Loops report upward through a stop channel and never call each other
//! - Teardown finishes before the next connect/accept begins

pub mod connect;
pub mod listen;
pub(crate) mod session;
pub mod state;

pub use connect::ConnectMode;
pub use listen::ListenMode;
pub use state::{StateReporter, TunnelState};
