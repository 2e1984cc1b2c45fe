//! HTTP framing for the tunnel.
//!
//! Only as much HTTP as the disguise needs: a fixed preamble each way, then a
//! long-lived chunked body in both directions.
//!
//! # Data Flow
//! ```text
//! outgoing: TAP payload → chunk.rs (size line + payload + CRLF) → transport
//! incoming: transport bytes → parser.rs (start line, headers, chunked body)
//!           → ParserHandler callbacks → TAP
//! ```

pub mod chunk;
pub mod parser;
pub mod preamble;
pub mod url;

pub use chunk::ChunkFrame;
pub use parser::{HttpParser, ParseError, ParsedMessage, ParserHandler, ParserState};
pub use preamble::{request_preamble, RESPONSE_PREAMBLE};
pub use url::UrlParts;
