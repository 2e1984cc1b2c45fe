//! Plaintext / TLS transport.
//!
//! # Responsibilities
//! - Own exactly one connection at a time
//! - connect / accept, with the TLS handshake folded into completion
//! - Hand out one read half and one write half to the relay loops
//! - shutdown / close / cancel for teardown
//!
//! # Design Decisions
//! - Plaintext vs TLS is a tagged enum picked once at construction
//! - `&mut self` on every operation: at most one outstanding read and one
//!   outstanding write per transport
//! - Each new connection installs a fresh cancellation token

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Buf;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsStream;
use tokio_util::sync::CancellationToken;

use crate::error::OpError;
use crate::net::cancel::CancellableIo;
use crate::net::tls::TlsContext;

/// Transport security, selected once.
#[derive(Debug, Clone, Default)]
pub enum Security {
    #[default]
    Plain,
    Tls(TlsContext),
}

/// The byte stream underneath a connected transport.
#[derive(Debug)]
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(&mut **s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(&mut **s).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_write_vectored(cx, bufs),
            Stream::Tls(s) => Pin::new(&mut **s).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            Stream::Plain(s) => s.is_write_vectored(),
            Stream::Tls(s) => s.is_write_vectored(),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(&mut **s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(&mut **s).poll_shutdown(cx),
        }
    }
}

pub type TransportReader = CancellableIo<ReadHalf<Stream>>;
pub type TransportWriter = CancellableIo<WriteHalf<Stream>>;

/// One tunnel connection, plaintext or TLS.
#[derive(Debug)]
pub struct Transport {
    security: Security,
    reader: Option<TransportReader>,
    writer: Option<TransportWriter>,
    peer: Option<SocketAddr>,
    cancel: CancellationToken,
}

impl Transport {
    pub fn new(security: Security) -> Self {
        Self {
            security,
            reader: None,
            writer: None,
            peer: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn plain() -> Self {
        Self::new(Security::Plain)
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.security, Security::Tls(_))
    }

    /// Dial `endpoint`. For TLS the client handshake runs before this
    /// returns; `host` is used as SNI unless the TLS config overrides it.
    pub async fn connect(&mut self, endpoint: SocketAddr, host: &str) -> Result<(), OpError> {
        self.close();
        self.cancel = CancellationToken::new();
        tracing::trace!(endpoint = %endpoint, tls = self.is_tls(), "Transport connecting");

        let tcp = self.abortable(TcpStream::connect(endpoint)).await?;
        let _ = tcp.set_nodelay(true);

        let stream = match &self.security {
            Security::Plain => Stream::Plain(tcp),
            Security::Tls(TlsContext::Client { connector, server_name }) => {
                let name = server_name.as_deref().unwrap_or(host).to_string();
                let name = ServerName::try_from(name).map_err(|e| {
                    OpError::Io(io::Error::new(io::ErrorKind::InvalidInput, e))
                })?;
                let tls = self.abortable(connector.connect(name, tcp)).await?;
                Stream::Tls(Box::new(TlsStream::Client(tls)))
            }
            Security::Tls(TlsContext::Server { .. }) => {
                return Err(OpError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "server TLS context cannot dial out",
                )))
            }
        };

        self.install(stream, endpoint);
        Ok(())
    }

    /// Accept one connection from `listener`. For TLS the server handshake
    /// runs before this returns.
    pub async fn accept(&mut self, listener: &TcpListener) -> Result<SocketAddr, OpError> {
        self.close();
        self.cancel = CancellationToken::new();

        let (tcp, peer) = self.abortable(listener.accept()).await?;
        let _ = tcp.set_nodelay(true);

        let stream = match &self.security {
            Security::Plain => Stream::Plain(tcp),
            Security::Tls(TlsContext::Server { acceptor }) => {
                let tls = self.abortable(acceptor.accept(tcp)).await?;
                Stream::Tls(Box::new(TlsStream::Server(tls)))
            }
            Security::Tls(TlsContext::Client { .. }) => {
                return Err(OpError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "client TLS context cannot accept",
                )))
            }
        };

        self.install(stream, peer);
        Ok(peer)
    }

    async fn abortable<F, T>(&self, fut: F) -> Result<T, OpError>
    where
        F: std::future::Future<Output = io::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(OpError::Aborted),
            res = fut => res.map_err(OpError::Io),
        }
    }

    fn install(&mut self, stream: Stream, peer: SocketAddr) {
        let (read, write) = tokio::io::split(stream);
        self.reader = Some(CancellableIo::new(read, self.cancel.clone()));
        self.writer = Some(CancellableIo::new(write, self.cancel.clone()));
        self.peer = Some(peer);
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some() || self.writer.is_some()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Both halves, for running the two relay loops concurrently.
    pub fn halves(&mut self) -> Option<(&mut TransportReader, &mut TransportWriter)> {
        match (self.reader.as_mut(), self.writer.as_mut()) {
            (Some(r), Some(w)) => Some((r, w)),
            _ => None,
        }
    }

    /// Single read; `Ok(0)` means the peer closed the connection.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, OpError> {
        match self.reader.as_mut() {
            Some(r) => r.read(buf).await,
            None => Err(not_connected()),
        }
    }

    /// Write every segment of `segments`.
    pub async fn write<B: Buf>(&mut self, segments: &mut B) -> Result<(), OpError> {
        match self.writer.as_mut() {
            Some(w) => w.write_all_buf(segments).await,
            None => Err(not_connected()),
        }
    }

    /// A clone of the current connection's cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Make any outstanding read/write complete with `OpError::Aborted`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Shut the sending side down (TLS sends close_notify first).
    pub async fn shutdown(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.shutdown().await,
            None => Ok(()),
        }
    }

    /// Release the connection. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(peer) = self.peer.take() {
            tracing::trace!(peer = %peer, "Transport closed");
        }
        self.reader = None;
        self.writer = None;
    }
}

fn not_connected() -> OpError {
    OpError::Io(io::Error::new(io::ErrorKind::NotConnected, "transport is not connected"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn connect_accept_read_write() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut transport = Transport::plain();
            let peer = transport.accept(&listener).await.unwrap();
            let mut buf = [0u8; 5];
            let n = transport.read(&mut buf).await.unwrap();
            (peer, buf[..n].to_vec())
        });

        let mut client = Transport::plain();
        client.connect(addr, "127.0.0.1").await.unwrap();
        assert!(client.is_open());
        assert_eq!(client.peer(), Some(addr));
        client.write(&mut &b"hello"[..]).await.unwrap();

        let (_, received) = server.await.unwrap();
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn cancel_aborts_pending_read() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut sink = Vec::new();
            let _ = socket.read_to_end(&mut sink).await;
        });

        let mut transport = Transport::plain();
        transport.connect(addr, "127.0.0.1").await.unwrap();
        let token = transport.cancel_token();
        let (reader, _writer) = transport.halves().unwrap();

        let mut buf = [0u8; 8];
        let (res, ()) = tokio::join!(reader.read(&mut buf), async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            token.cancel();
        });
        assert!(matches!(res, Err(OpError::Aborted)));
    }

    #[tokio::test]
    async fn refused_connect_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut transport = Transport::plain();
        let err = transport.connect(addr, "127.0.0.1").await.unwrap_err();
        assert!(matches!(err, OpError::Io(_)));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_reads_fail_after() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = socket.write_all(b"x").await;
        });

        let mut transport = Transport::plain();
        transport.connect(addr, "127.0.0.1").await.unwrap();
        transport.shutdown().await.unwrap();
        transport.close();
        transport.close();
        assert!(!transport.is_open());

        let mut buf = [0u8; 1];
        assert!(matches!(transport.read(&mut buf).await, Err(OpError::Io(_))));
    }
}
