//! Inbound loop: transport bytes → parser → TAP frames.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::OpError;
use crate::http::{HttpParser, ParsedMessage, ParserHandler};
use crate::net::CancellableIo;
use crate::observability::metrics::{self, Direction};
use crate::relay::{LoopStopReason, StopSignal};

/// Largest chunk that is still coalesced into a single TAP write. Bigger
/// than any link-layer frame, so only a misbehaving peer ever reaches it.
pub const MAX_COALESCED_FRAME: usize = 64 * 1024;

/// Parser callbacks for one read's worth of input.
///
/// Chunk pieces are coalesced so that each complete chunk becomes exactly
/// one TAP write. A chunk that grows past [`MAX_COALESCED_FRAME`] is passed
/// on in pieces instead of being buffered. Bodies without chunked framing
/// are passed through per segment.
struct FrameCollector<G> {
    gate: G,
    partial: Vec<u8>,
    ready: Vec<Vec<u8>>,
}

impl<G> ParserHandler for FrameCollector<G>
where
    G: FnMut(&ParsedMessage) -> bool,
{
    fn on_headers_complete(&mut self, message: &ParsedMessage) -> bool {
        (self.gate)(message)
    }

    fn on_body(&mut self, message: &ParsedMessage, data: &[u8]) -> bool {
        if message.is_chunked() {
            self.partial.extend_from_slice(data);
            if self.partial.len() >= MAX_COALESCED_FRAME {
                self.ready.push(std::mem::take(&mut self.partial));
            }
        } else {
            self.ready.push(data.to_vec());
        }
        true
    }

    fn on_chunk_complete(&mut self, _message: &ParsedMessage) -> bool {
        if !self.partial.is_empty() {
            self.ready.push(std::mem::take(&mut self.partial));
        }
        true
    }
}

/// Feed transport reads through `parser` and write decoded frames to the
/// TAP device until something fails or the connection is cancelled.
///
/// `gate` sees the peer's header block; returning `false` stops the loop
/// with `RequestParsingError`. The parser is borrowed so the owner can reset
/// it during teardown.
pub async fn http_to_tap<R, W, G>(
    transport: &mut CancellableIo<R>,
    tap: &mut CancellableIo<W>,
    parser: &mut HttpParser,
    read_size: usize,
    gate: G,
    stop: &StopSignal,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    G: FnMut(&ParsedMessage) -> bool,
{
    let mut buf = vec![0u8; read_size];
    let mut collector = FrameCollector {
        gate,
        partial: Vec::new(),
        ready: Vec::new(),
    };

    loop {
        let n = match transport.read(&mut buf).await {
            Ok(0) => {
                tracing::info!("Peer closed the connection");
                stop.stop(LoopStopReason::SocketReadError);
                return;
            }
            Ok(n) => n,
            Err(OpError::Aborted) => return,
            Err(OpError::Io(e)) => {
                tracing::warn!(error = %e, "Transport read failed");
                stop.stop(LoopStopReason::SocketReadError);
                return;
            }
        };

        parser.notify(&buf[..n], &mut collector);
        if let Some(err) = parser.error() {
            tracing::warn!(error = %err, "Malformed data from peer");
            stop.stop(LoopStopReason::RequestParsingError);
            return;
        }

        for frame in collector.ready.drain(..) {
            match tap.write_all(&frame).await {
                Ok(()) => {
                    tracing::trace!(bytes = frame.len(), "TAP frame written");
                    metrics::record_bytes(Direction::HttpToTap, frame.len());
                }
                Err(OpError::Aborted) => return,
                Err(OpError::Io(e)) => {
                    tracing::warn!(error = %e, "TAP write failed");
                    stop.stop(LoopStopReason::TapWriteError);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::sync::CancellationToken;

    const RESPONSE: &[u8] =
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Type: application/octet-stream\r\n\r\n";

    #[tokio::test]
    async fn chunks_are_written_whole() {
        let (sock_side, mut sock_peer) = tokio::io::duplex(4096);
        let (tap_side, mut tap_peer) = tokio::io::duplex(4096);
        let token = CancellationToken::new();
        let mut sock = CancellableIo::new(sock_side, token.clone());
        let mut tap = CancellableIo::new(tap_side, token.clone());
        let (stop, mut stopped) = StopSignal::channel();

        let relay = tokio::spawn(async move {
            let mut parser = HttpParser::new();
            http_to_tap(&mut sock, &mut tap, &mut parser, 8, |_: &ParsedMessage| true, &stop).await;
        });

        // A 26-byte chunk arrives through 8-byte reads.
        sock_peer.write_all(RESPONSE).await.unwrap();
        sock_peer.write_all(b"1a\r\nabcdefghijklmnopqrstuvwxyz\r\n").await.unwrap();
        sock_peer.write_all(b"5\r\nhello\r\n").await.unwrap();

        let mut first = [0u8; 26];
        tap_peer.read_exact(&mut first).await.unwrap();
        assert_eq!(&first, b"abcdefghijklmnopqrstuvwxyz");
        let mut second = [0u8; 5];
        tap_peer.read_exact(&mut second).await.unwrap();
        assert_eq!(&second, b"hello");

        drop(sock_peer);
        assert_eq!(stopped.recv().await, Some(LoopStopReason::SocketReadError));
        relay.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_preamble_is_a_parsing_error() {
        let (sock_side, mut sock_peer) = tokio::io::duplex(4096);
        let (tap_side, _tap_peer) = tokio::io::duplex(4096);
        let token = CancellationToken::new();
        let mut sock = CancellableIo::new(sock_side, token.clone());
        let mut tap = CancellableIo::new(tap_side, token);
        let (stop, mut stopped) = StopSignal::channel();
        let mut parser = HttpParser::new();

        sock_peer
            .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        http_to_tap(
            &mut sock,
            &mut tap,
            &mut parser,
            512,
            |m: &ParsedMessage| m.status_code == 200,
            &stop,
        )
        .await;

        assert_eq!(stopped.try_recv().ok(), Some(LoopStopReason::RequestParsingError));
        assert!(parser.failed());
    }

    #[tokio::test]
    async fn garbage_is_a_parsing_error() {
        let (sock_side, mut sock_peer) = tokio::io::duplex(4096);
        let (tap_side, _tap_peer) = tokio::io::duplex(4096);
        let token = CancellationToken::new();
        let mut sock = CancellableIo::new(sock_side, token.clone());
        let mut tap = CancellableIo::new(tap_side, token);
        let (stop, mut stopped) = StopSignal::channel();
        let mut parser = HttpParser::new();

        sock_peer.write_all(b"not http at all\r\n").await.unwrap();
        http_to_tap(&mut sock, &mut tap, &mut parser, 512, |_: &ParsedMessage| true, &stop).await;

        assert_eq!(stopped.try_recv().ok(), Some(LoopStopReason::RequestParsingError));
    }

    #[tokio::test]
    async fn tap_write_failure() {
        let (sock_side, mut sock_peer) = tokio::io::duplex(4096);
        let (tap_side, tap_peer) = tokio::io::duplex(4096);
        drop(tap_peer);
        let token = CancellationToken::new();
        let mut sock = CancellableIo::new(sock_side, token.clone());
        let mut tap = CancellableIo::new(tap_side, token);
        let (stop, mut stopped) = StopSignal::channel();
        let mut parser = HttpParser::new();

        sock_peer.write_all(RESPONSE).await.unwrap();
        sock_peer.write_all(b"3\r\nabc\r\n").await.unwrap();
        http_to_tap(&mut sock, &mut tap, &mut parser, 512, |_: &ParsedMessage| true, &stop).await;

        assert_eq!(stopped.try_recv().ok(), Some(LoopStopReason::TapWriteError));
    }

    #[tokio::test]
    async fn cancellation_is_silent() {
        let (sock_side, _sock_peer) = tokio::io::duplex(64);
        let (tap_side, _tap_peer) = tokio::io::duplex(64);
        let token = CancellationToken::new();
        let mut sock = CancellableIo::new(sock_side, token.clone());
        let mut tap = CancellableIo::new(tap_side, token.clone());
        let (stop, mut stopped) = StopSignal::channel();
        let mut parser = HttpParser::new();

        token.cancel();
        http_to_tap(&mut sock, &mut tap, &mut parser, 512, |_: &ParsedMessage| true, &stop).await;
        assert!(stopped.try_recv().is_err());
    }

    #[tokio::test]
    async fn oversized_chunk_is_relayed_without_waiting_for_its_end() {
        let (sock_side, mut sock_peer) = tokio::io::duplex(4096);
        let (tap_side, mut tap_peer) = tokio::io::duplex(256 * 1024);
        let token = CancellationToken::new();
        let mut sock = CancellableIo::new(sock_side, token.clone());
        let mut tap = CancellableIo::new(tap_side, token.clone());
        let (stop, mut stopped) = StopSignal::channel();

        let relay = tokio::spawn(async move {
            let mut parser = HttpParser::new();
            http_to_tap(&mut sock, &mut tap, &mut parser, 512, |_: &ParsedMessage| true, &stop).await;
        });

        // The declared length is never reached; the peer just keeps sending.
        let payload = vec![0xa5u8; 3 * MAX_COALESCED_FRAME];
        let sent = payload.clone();
        let writer = tokio::spawn(async move {
            sock_peer.write_all(RESPONSE).await.unwrap();
            sock_peer.write_all(b"7fffffffffff\r\n").await.unwrap();
            sock_peer.write_all(&sent).await.unwrap();
            sock_peer
        });

        let mut relayed = vec![0u8; 2 * MAX_COALESCED_FRAME];
        tokio::time::timeout(std::time::Duration::from_secs(5), tap_peer.read_exact(&mut relayed))
            .await
            .expect("oversized chunk was buffered instead of relayed")
            .unwrap();
        assert_eq!(relayed, payload[..relayed.len()]);
        assert!(stopped.try_recv().is_err());

        let sock_peer = writer.await.unwrap();
        token.cancel();
        relay.await.unwrap();
        drop(sock_peer);
    }
}
