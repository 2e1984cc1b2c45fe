//! Cancellable I/O wrapper.
//!
//! Every read and write issued by the relay loops races a
//! [`CancellationToken`]. Firing the token makes the pending operation (and
//! every later one) complete with [`OpError::Aborted`] instead of an I/O
//! error, so the loops can tell a teardown echo from a real failure.

use std::io;
use std::time::Duration;

use bytes::Buf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::OpError;

/// Upper bound on a write-side shutdown. A TLS shutdown flushes pending
/// records first and a peer that stopped reading would otherwise hold the
/// teardown forever.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// An I/O object whose operations can be aborted from elsewhere.
#[derive(Debug)]
pub struct CancellableIo<T> {
    inner: T,
    cancel: CancellationToken,
}

impl<T> CancellableIo<T> {
    pub fn new(inner: T, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }

    /// Abort the outstanding operation, if any, and all future ones.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: AsyncRead + Unpin> CancellableIo<T> {
    /// Read once into `buf`; `Ok(0)` means end of stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, OpError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(OpError::Aborted),
            res = self.inner.read(buf) => res.map_err(OpError::Io),
        }
    }
}

impl<T: AsyncWrite + Unpin> CancellableIo<T> {
    /// Write all of `data`.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), OpError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(OpError::Aborted),
            res = self.inner.write_all(data) => res.map_err(OpError::Io),
        }
    }

    /// Write every segment of a multi-segment buffer, vectored when the
    /// underlying writer supports it.
    pub async fn write_all_buf<B: Buf>(&mut self, buf: &mut B) -> Result<(), OpError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(OpError::Aborted),
            res = self.inner.write_all_buf(buf) => res.map_err(OpError::Io),
        }
    }

    /// Shut the write side down. Not subject to cancellation (teardown
    /// calls this after the token has already fired) but bounded by
    /// [`SHUTDOWN_GRACE`]; on expiry the caller just closes the connection.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        match tokio::time::timeout(SHUTDOWN_GRACE, self.inner.shutdown()).await {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "peer did not drain the connection before shutdown",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// A writer whose shutdown never completes, like a TLS stream stuck
    /// flushing into a full peer window.
    struct StalledShutdown;

    impl AsyncWrite for StalledShutdown {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn pending_read_completes_aborted() {
        let (client, _server) = tokio::io::duplex(64);
        let token = CancellationToken::new();
        let mut io = CancellableIo::new(client, token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let mut buf = [0u8; 16];
        let res = io.read(&mut buf).await;
        assert!(matches!(res, Err(OpError::Aborted)));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn operations_after_cancel_are_aborted() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut io = CancellableIo::new(client, CancellationToken::new());

        io.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        io.cancel();
        assert!(io.is_cancelled());
        assert!(matches!(io.write_all(b"late").await, Err(OpError::Aborted)));
    }

    #[tokio::test]
    async fn buf_chain_is_written_in_order() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut io = CancellableIo::new(client, CancellationToken::new());

        let mut frame = Buf::chain(Buf::chain(&b"3\r\n"[..], &b"abc"[..]), &b"\r\n"[..]);
        io.write_all_buf(&mut frame).await.unwrap();

        let mut buf = [0u8; 8];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"3\r\nabc\r\n");
    }

    #[tokio::test]
    async fn stalled_shutdown_gives_up_after_grace() {
        let token = CancellationToken::new();
        let mut io = CancellableIo::new(StalledShutdown, token.clone());
        token.cancel();

        let started = std::time::Instant::now();
        let err = tokio::time::timeout(Duration::from_secs(5), io.shutdown())
            .await
            .expect("shutdown was not bounded")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(started.elapsed() >= SHUTDOWN_GRACE);
    }

    #[tokio::test]
    async fn shutdown_of_a_healthy_writer_completes() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut io = CancellableIo::new(client, CancellationToken::new());
        io.shutdown().await.unwrap();

        let mut rest = Vec::new();
        server.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
