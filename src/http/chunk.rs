//! Chunked transfer-encoding frames.
//!
//! Encoding only; decoding is the parser's chunked-body path.

use bytes::{Buf, Bytes};

pub const CRLF: &[u8] = b"\r\n";

/// One outgoing chunk: `hex(len) CRLF payload CRLF`.
///
/// The payload is borrowed so the relay can write straight from its read
/// buffer as three segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame<'a> {
    header: String,
    payload: &'a [u8],
}

impl<'a> ChunkFrame<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            header: format!("{:x}\r\n", payload.len()),
            payload,
        }
    }

    /// The size line including its CRLF.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        self.payload
    }

    /// Size line, payload, trailing CRLF.
    pub fn segments(&self) -> [&[u8]; 3] {
        [self.header.as_bytes(), self.payload, CRLF]
    }

    pub fn encoded_len(&self) -> usize {
        self.header.len() + self.payload.len() + CRLF.len()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for segment in self.segments() {
            out.extend_from_slice(segment);
        }
        out
    }

    /// The frame as a `Buf` chain for vectored writes.
    pub fn into_buf(self) -> impl Buf + 'a {
        Bytes::from(self.header)
            .chain(self.payload)
            .chain(Bytes::from_static(CRLF))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_bytes() {
        let payload = [0xabu8; 60];
        let frame = ChunkFrame::new(&payload);
        assert_eq!(frame.header(), "3c\r\n");
        assert_eq!(frame.encoded_len(), 4 + 60 + 2);

        let bytes = frame.to_vec();
        assert!(bytes.starts_with(b"3c\r\n"));
        assert!(bytes.ends_with(b"\r\n"));
        assert_eq!(&bytes[4..64], &payload[..]);
    }

    #[test]
    fn length_is_lowercase_hex_without_padding() {
        assert_eq!(ChunkFrame::new(&[0; 1]).header(), "1\r\n");
        assert_eq!(ChunkFrame::new(&[0; 255]).header(), "ff\r\n");
        assert_eq!(ChunkFrame::new(&[0; 4096]).header(), "1000\r\n");
        assert_eq!(ChunkFrame::new(&[]).to_vec(), b"0\r\n\r\n");
    }

    #[test]
    fn buf_chain_matches_contiguous_encoding() {
        let payload = b"link-layer frame";
        let frame = ChunkFrame::new(payload);
        let expected = frame.to_vec();

        let mut buf = frame.into_buf();
        assert_eq!(buf.remaining(), expected.len());
        let flat = buf.copy_to_bytes(buf.remaining());
        assert_eq!(&flat[..], &expected[..]);
    }
}
