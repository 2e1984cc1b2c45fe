//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! connect role:
//!     address.rs (split host/port) → resolver.rs (candidate endpoints)
//!     → transport.rs connect (+ tls.rs client handshake)
//!
//! listen role:
//!     listener.rs (bind once, backlog 1)
//!     → transport.rs accept (+ tls.rs server handshake)
//!
//! both:
//!     transport halves wrapped by cancel.rs → relay loops
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently behind `Transport`
//! - Cancellation surfaces as `OpError::Aborted`, never as an I/O error
//! - Resolution sits behind a trait so tests can script endpoint lists

pub mod address;
pub mod cancel;
pub mod connection;
pub mod listener;
pub mod resolver;
pub mod tls;
pub mod transport;

pub use address::HostPort;
pub use cancel::CancellableIo;
pub use listener::Listener;
pub use resolver::{DnsResolver, Resolve, StaticResolver};
pub use transport::{Security, Transport};
