//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (tracing events, filtered by EnvFilter)
//!     → metrics.rs (counters via the `metrics` facade)
//!     → spans.rs (role/address and per-connection spans)
//!
//! Consumers:
//!     → Log sink (stderr or an append-only file)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Counters are no-ops until an exporter is installed
//! - Every event inside a connection cycle carries the connection id

pub mod logging;
pub mod metrics;
pub mod spans;
