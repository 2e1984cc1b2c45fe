//! Outbound loop: TAP frames → chunked body on the transport.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::OpError;
use crate::http::ChunkFrame;
use crate::net::CancellableIo;
use crate::observability::metrics::{self, Direction};
use crate::relay::{LoopStopReason, StopSignal};

/// Copy TAP reads to the transport, one chunk per read, until something
/// fails or the connection is cancelled.
///
/// A zero-byte TAP read means the device is gone and is reported as
/// `TapReadError`, so a terminating zero-length chunk is never written.
pub async fn tap_to_http<R, W>(
    tap: &mut CancellableIo<R>,
    transport: &mut CancellableIo<W>,
    read_size: usize,
    stop: &StopSignal,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; read_size];

    loop {
        let n = match tap.read(&mut buf).await {
            Ok(0) => {
                tracing::warn!("TAP device returned end of stream");
                stop.stop(LoopStopReason::TapReadError);
                return;
            }
            Ok(n) => n,
            Err(OpError::Aborted) => return,
            Err(OpError::Io(e)) => {
                tracing::warn!(error = %e, "TAP read failed");
                stop.stop(LoopStopReason::TapReadError);
                return;
            }
        };

        let mut frame = ChunkFrame::new(&buf[..n]).into_buf();
        match transport.write_all_buf(&mut frame).await {
            Ok(()) => {
                tracing::trace!(bytes = n, "TAP frame sent");
                metrics::record_bytes(Direction::TapToHttp, n);
            }
            Err(OpError::Aborted) => return,
            Err(OpError::Io(e)) => {
                tracing::warn!(error = %e, "Transport write failed");
                stop.stop(LoopStopReason::SocketWriteError);
                return;
            }
        }
    }
}
