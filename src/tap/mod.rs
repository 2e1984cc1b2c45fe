//! TAP interface access.
//!
//! # Design Decisions
//! - The orchestrators only need a readable and a writable direction at the
//!   same time, so the seam is [`TapIo::split`]
//! - The kernel device (a `tun` layer-2 interface) and in-memory test pairs
//!   both implement it

#[cfg(target_os = "linux")]
pub mod device;

#[cfg(target_os = "linux")]
pub use device::TapDevice;

use tokio::io::{AsyncRead, AsyncWrite};

/// A frame source and sink that can be used in both directions at once.
///
/// Reads return one link-layer frame each; writes hand one frame to the
/// interface.
pub trait TapIo {
    type Reader<'a>: AsyncRead + Unpin
    where
        Self: 'a;
    type Writer<'a>: AsyncWrite + Unpin
    where
        Self: 'a;

    fn split(&mut self) -> (Self::Reader<'_>, Self::Writer<'_>);
}

/// A separate reader and writer, e.g. the halves of `tokio::io::duplex`.
impl<R, W> TapIo for (R, W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    type Reader<'a> = &'a mut R where Self: 'a;
    type Writer<'a> = &'a mut W where Self: 'a;

    fn split(&mut self) -> (Self::Reader<'_>, Self::Writer<'_>) {
        (&mut self.0, &mut self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn pair_splits_into_both_directions() {
        let (ours, mut theirs) = tokio::io::duplex(64);
        let mut tap = tokio::io::split(ours);

        let (reader, writer) = tap.split();
        writer.write_all(b"out").await.unwrap();
        theirs.write_all(b"in").await.unwrap();

        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"in");

        let mut buf = [0u8; 3];
        theirs.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"out");
    }
}
