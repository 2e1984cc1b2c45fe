//! secret-passage: Ethernet frames over a long-lived chunked HTTP exchange.
//!
//! ```text
//!   TAP device                                         peer
//!  ┌──────────┐   tap_to_http   ┌───────────┐   chunked body   ┌──────┐
//!  │  frames  │ ──────────────▶ │ transport │ ───────────────▶ │      │
//!  │          │ ◀────────────── │ TCP / TLS │ ◀─────────────── │      │
//!  └──────────┘   http_to_tap   └───────────┘   chunked body   └──────┘
//!                 (HttpParser)
//! ```
//!
//! The connect role dials out and sends a POST preamble; the listen role
//! accepts one connection at a time and answers with a 200 preamble. After
//! that both directions carry one chunk per Ethernet frame until either side
//! fails, at which point the connection is torn down and re-established.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod relay;
pub mod tap;
pub mod tunnel;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::PassageConfig;
pub use error::{OpError, StartupError, TunnelError};
pub use lifecycle::Shutdown;
pub use tunnel::{ConnectMode, ListenMode, TunnelState};
