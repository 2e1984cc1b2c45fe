//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     pid file → metrics exporter → TAP device → TLS material → orchestrator
//!
//! Shutdown (shutdown.rs):
//!     trigger → orchestrators tear their connection down → run returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: anything that can fail fatally happens before the
//!   first connect/accept
//! - The pid file is released last, when `run` returns

pub mod pid_file;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
