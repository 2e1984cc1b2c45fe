//! Incremental HTTP/1.x message parser.
//!
//! Sans-I/O: the caller feeds arbitrary slices through [`HttpParser::notify`]
//! and receives callbacks on a [`ParserHandler`]. Only what the tunnel needs
//! is understood: the start line, the header block, and a chunked,
//! fixed-length or read-until-close body.
//!
//! # States
//! ```text
//! Start → RequestLine | StatusLine → Headers → HeadersComplete
//!       → Body → MessageComplete
//! any state → Failed (terminal until reset)
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

use crate::http::url::UrlParts;

/// Upper bound for the start line plus header block (http-parser's limit).
pub const MAX_HEADER_BYTES: usize = 80 * 1024;

/// Upper bound for a chunk-size or trailer line.
const MAX_LINE_BYTES: usize = 4 * 1024;

/// Why parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid request line: {0:?}")]
    InvalidRequestLine(String),

    #[error("invalid status line: {0:?}")]
    InvalidStatusLine(String),

    #[error("unsupported HTTP version: {0:?}")]
    UnsupportedVersion(String),

    #[error("invalid request target: {0:?}")]
    InvalidUrl(String),

    #[error("invalid header line: {0:?}")]
    InvalidHeader(String),

    #[error("header section exceeds {MAX_HEADER_BYTES} bytes")]
    HeaderTooLarge,

    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("invalid chunk size line: {0:?}")]
    InvalidChunkSize(String),

    #[error("chunk data not followed by CRLF")]
    InvalidChunkTerminator,

    #[error("line exceeds {MAX_LINE_BYTES} bytes")]
    LineTooLong,

    #[error("headers rejected by handler")]
    HeadersRejected,

    #[error("body rejected by handler")]
    BodyRejected,

    #[error("data after end of message")]
    DataAfterMessage,
}

/// Public view of where the parser is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Start,
    RequestLine,
    StatusLine,
    Headers,
    HeadersComplete,
    Body,
    MessageComplete,
    Failed,
}

/// Request or response, decided by the start line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

/// Everything learned about the current message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    pub kind: Option<MessageKind>,
    pub method: String,
    /// (major, minor)
    pub version: (u8, u8),
    pub status_code: u16,
    pub status_text: String,
    pub url: UrlParts,
    /// Field names as received; a repeated name keeps the last value.
    pub headers: BTreeMap<String, String>,
    pub headers_complete: bool,
    pub body_complete: bool,
}

impl ParsedMessage {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_request(&self) -> bool {
        self.kind == Some(MessageKind::Request)
    }

    pub fn is_response(&self) -> bool {
        self.kind == Some(MessageKind::Response)
    }

    /// Whether the last transfer coding is `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .and_then(|te| te.rsplit(',').next())
            .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
            .unwrap_or(false)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.to_string());
    }
}

/// Callbacks fired while parsing.
///
/// The boolean returned by the gating callbacks decides whether parsing
/// continues; `false` puts the parser into the failed state.
pub trait ParserHandler {
    /// The header block is complete.
    fn on_headers_complete(&mut self, message: &ParsedMessage) -> bool;

    /// A piece of decoded body. One chunk can arrive in several pieces when
    /// it spans `notify` calls.
    fn on_body(&mut self, message: &ParsedMessage, data: &[u8]) -> bool;

    /// The current chunk's data and trailing CRLF have been consumed.
    fn on_chunk_complete(&mut self, _message: &ParsedMessage) -> bool {
        true
    }

    fn on_message_complete(&mut self, _message: &ParsedMessage) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    ChunkSize,
    ChunkData { remaining: u64 },
    ChunkEnd { seen_cr: bool },
    Trailers,
    Length { remaining: u64 },
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    StartLine,
    Headers,
    Body(Body),
    MessageComplete,
    Failed,
}

/// Incremental parser for one HTTP message.
#[derive(Debug)]
pub struct HttpParser {
    state: State,
    message: ParsedMessage,
    line: Vec<u8>,
    header_bytes: usize,
    error: Option<ParseError>,
}

impl Default for HttpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpParser {
    pub fn new() -> Self {
        Self {
            state: State::Start,
            message: ParsedMessage::default(),
            line: Vec::new(),
            header_bytes: 0,
            error: None,
        }
    }

    /// Back to `Start` with an empty message.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Feed `data`; returns how many bytes were consumed.
    ///
    /// Everything is consumed unless the parser fails, in which case the
    /// return value is the offset of the offending input.
    pub fn notify<H: ParserHandler>(&mut self, data: &[u8], handler: &mut H) -> usize {
        let mut pos = 0;
        while pos < data.len() && self.state != State::Failed {
            match self.step(&data[pos..], handler) {
                Ok(n) => pos += n,
                Err(err) => {
                    self.state = State::Failed;
                    self.error = Some(err);
                }
            }
        }
        pos
    }

    pub fn state(&self) -> ParserState {
        match self.state {
            State::Start => ParserState::Start,
            State::StartLine => match self.message.kind {
                Some(MessageKind::Response) => ParserState::StatusLine,
                _ => ParserState::RequestLine,
            },
            State::Headers if self.message.headers_complete => ParserState::HeadersComplete,
            State::Headers => ParserState::Headers,
            State::Body(_) => ParserState::Body,
            State::MessageComplete => ParserState::MessageComplete,
            State::Failed => ParserState::Failed,
        }
    }

    pub fn message(&self) -> &ParsedMessage {
        &self.message
    }

    pub fn headers_complete(&self) -> bool {
        self.message.headers_complete
    }

    pub fn body_complete(&self) -> bool {
        self.message.body_complete
    }

    pub fn failed(&self) -> bool {
        self.state == State::Failed
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    pub fn status_code(&self) -> u16 {
        self.message.status_code
    }

    pub fn status_text(&self) -> &str {
        &self.message.status_text
    }

    pub fn url(&self) -> &UrlParts {
        &self.message.url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.message.headers
    }

    fn step<H: ParserHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<usize, ParseError> {
        match self.state {
            State::Start => {
                // Tolerate stray CRLFs before the start line.
                let skip = data.iter().take_while(|b| matches!(b, b'\r' | b'\n')).count();
                if skip < data.len() {
                    self.state = State::StartLine;
                    self.message.kind = Some(if data[skip..].starts_with(b"HTTP/") {
                        MessageKind::Response
                    } else {
                        MessageKind::Request
                    });
                }
                Ok(skip)
            }
            State::StartLine => {
                let (n, line) = self.take_header_line(data)?;
                if let Some(line) = line {
                    self.parse_start_line(&line)?;
                    self.state = State::Headers;
                }
                Ok(n)
            }
            State::Headers => {
                let (n, line) = self.take_header_line(data)?;
                if let Some(line) = line {
                    if line.is_empty() {
                        self.finish_headers(handler)?;
                    } else {
                        self.parse_header(&line)?;
                    }
                }
                Ok(n)
            }
            State::Body(body) => self.step_body(body, data, handler),
            State::MessageComplete => Err(ParseError::DataAfterMessage),
            State::Failed => Ok(0),
        }
    }

    fn step_body<H: ParserHandler>(
        &mut self,
        body: Body,
        data: &[u8],
        handler: &mut H,
    ) -> Result<usize, ParseError> {
        match body {
            Body::ChunkSize => {
                let (n, line) = self.take_line(data, MAX_LINE_BYTES)?;
                if let Some(line) = line {
                    let size = parse_chunk_size(&line)?;
                    self.state = State::Body(if size == 0 {
                        Body::Trailers
                    } else {
                        Body::ChunkData { remaining: size }
                    });
                }
                Ok(n)
            }
            Body::ChunkData { remaining } => {
                let n = take_up_to(remaining, data.len());
                if !handler.on_body(&self.message, &data[..n]) {
                    return Err(ParseError::BodyRejected);
                }
                let remaining = remaining - n as u64;
                self.state = State::Body(if remaining == 0 {
                    Body::ChunkEnd { seen_cr: false }
                } else {
                    Body::ChunkData { remaining }
                });
                Ok(n)
            }
            Body::ChunkEnd { seen_cr } => match (seen_cr, data[0]) {
                (false, b'\r') => {
                    self.state = State::Body(Body::ChunkEnd { seen_cr: true });
                    Ok(1)
                }
                (true, b'\n') => {
                    if !handler.on_chunk_complete(&self.message) {
                        return Err(ParseError::BodyRejected);
                    }
                    self.state = State::Body(Body::ChunkSize);
                    Ok(1)
                }
                _ => Err(ParseError::InvalidChunkTerminator),
            },
            Body::Trailers => {
                let (n, line) = self.take_line(data, MAX_LINE_BYTES)?;
                if let Some(line) = line {
                    if line.is_empty() {
                        self.complete(handler);
                    }
                }
                Ok(n)
            }
            Body::Length { remaining } => {
                let n = take_up_to(remaining, data.len());
                if !handler.on_body(&self.message, &data[..n]) {
                    return Err(ParseError::BodyRejected);
                }
                let remaining = remaining - n as u64;
                if remaining == 0 {
                    self.complete(handler);
                } else {
                    self.state = State::Body(Body::Length { remaining });
                }
                Ok(n)
            }
            Body::UntilClose => {
                if !handler.on_body(&self.message, data) {
                    return Err(ParseError::BodyRejected);
                }
                Ok(data.len())
            }
        }
    }

    fn complete<H: ParserHandler>(&mut self, handler: &mut H) {
        self.message.body_complete = true;
        self.state = State::MessageComplete;
        handler.on_message_complete(&self.message);
    }

    /// Accumulate up to and including the next LF. Returns the bytes
    /// consumed and, once a whole line is in, the line without CRLF.
    fn take_line(&mut self, data: &[u8], limit: usize) -> Result<(usize, Option<Vec<u8>>), ParseError> {
        match data.iter().position(|&b| b == b'\n') {
            Some(idx) => {
                self.line.extend_from_slice(&data[..idx]);
                let mut line = std::mem::take(&mut self.line);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.len() > limit {
                    return Err(ParseError::LineTooLong);
                }
                Ok((idx + 1, Some(line)))
            }
            None => {
                self.line.extend_from_slice(data);
                // +1 leaves room for a CR whose LF has not arrived yet.
                if self.line.len() > limit + 1 {
                    return Err(ParseError::LineTooLong);
                }
                Ok((data.len(), None))
            }
        }
    }

    fn take_header_line(&mut self, data: &[u8]) -> Result<(usize, Option<Vec<u8>>), ParseError> {
        let (n, line) = self
            .take_line(data, MAX_HEADER_BYTES)
            .map_err(|_| ParseError::HeaderTooLarge)?;
        self.header_bytes += n;
        if self.header_bytes > MAX_HEADER_BYTES {
            return Err(ParseError::HeaderTooLarge);
        }
        Ok((n, line))
    }

    fn parse_start_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let text = String::from_utf8_lossy(line);
        match self.message.kind {
            Some(MessageKind::Response) => {
                // HTTP/1.1 200 OK
                let mut parts = text.splitn(3, ' ');
                let version = parts.next().unwrap_or_default();
                let code = parts.next().unwrap_or_default();
                let reason = parts.next().unwrap_or_default();
                self.message.version = parse_version(version)?;
                if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) || code.starts_with('0') {
                    return Err(ParseError::InvalidStatusLine(text.into_owned()));
                }
                self.message.status_code = code
                    .parse()
                    .map_err(|_| ParseError::InvalidStatusLine(text.to_string()))?;
                self.message.status_text = reason.trim().to_string();
            }
            _ => {
                // POST /tunnel HTTP/1.1
                let parts: Vec<&str> = text.split(' ').collect();
                let [method, target, version] = parts.as_slice() else {
                    return Err(ParseError::InvalidRequestLine(text.into_owned()));
                };
                if method.is_empty() || !method.bytes().all(is_token_byte) {
                    return Err(ParseError::InvalidRequestLine(text.into_owned()));
                }
                self.message.method = method.to_string();
                self.message.url = UrlParts::parse(target)
                    .ok_or_else(|| ParseError::InvalidUrl(target.to_string()))?;
                self.message.version = parse_version(version)?;
            }
        }
        Ok(())
    }

    fn parse_header(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let text = String::from_utf8_lossy(line);
        let Some((name, value)) = text.split_once(':') else {
            return Err(ParseError::InvalidHeader(text.into_owned()));
        };
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(ParseError::InvalidHeader(text.into_owned()));
        }
        self.message.set_header(name, value.trim());
        Ok(())
    }

    fn finish_headers<H: ParserHandler>(&mut self, handler: &mut H) -> Result<(), ParseError> {
        let body = self.body_framing()?;
        self.message.headers_complete = true;
        if !handler.on_headers_complete(&self.message) {
            return Err(ParseError::HeadersRejected);
        }
        match body {
            Some(body) => self.state = State::Body(body),
            None => self.complete(handler),
        }
        Ok(())
    }

    fn body_framing(&self) -> Result<Option<Body>, ParseError> {
        if self.message.is_chunked() {
            return Ok(Some(Body::ChunkSize));
        }
        if let Some(value) = self.message.header("content-length") {
            let length: u64 = value
                .parse()
                .map_err(|_| ParseError::InvalidContentLength(value.to_string()))?;
            return Ok((length > 0).then_some(Body::Length { remaining: length }));
        }
        match self.message.kind {
            Some(MessageKind::Response) => {
                let code = self.message.status_code;
                if (100..200).contains(&code) || code == 204 || code == 304 {
                    Ok(None)
                } else {
                    Ok(Some(Body::UntilClose))
                }
            }
            _ => Ok(None),
        }
    }
}

fn take_up_to(remaining: u64, available: usize) -> usize {
    usize::try_from(remaining).map_or(available, |r| r.min(available))
}

fn parse_version(version: &str) -> Result<(u8, u8), ParseError> {
    match version {
        "HTTP/1.1" => Ok((1, 1)),
        "HTTP/1.0" => Ok((1, 0)),
        other => Err(ParseError::UnsupportedVersion(other.to_string())),
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidChunkSize(String::from_utf8_lossy(line).into_owned());
    let text = std::str::from_utf8(line).map_err(|_| invalid())?;
    let size = text.split(';').next().unwrap_or_default().trim();
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u64::from_str_radix(size, 16).map_err(|_| invalid())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
