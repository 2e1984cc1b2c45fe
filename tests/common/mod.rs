//! Shared utilities for the tunnel integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use secret_passage::config::RelayConfig;
use secret_passage::TunnelState;
use tokio::io::{AsyncRead, AsyncReadExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// In-memory TAP handle as seen by the orchestrator.
pub type TestTap = (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>);

/// An in-memory TAP: the orchestrator side and the "network stack" side.
pub fn tap_pair() -> (TestTap, DuplexStream) {
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    (tokio::io::split(ours), theirs)
}

pub fn relay_config() -> RelayConfig {
    RelayConfig::default()
}

/// A loopback endpoint with nothing listening on it.
pub async fn refusing_endpoint() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Next reported state, failing the test after five seconds.
pub async fn next_state(rx: &mut mpsc::UnboundedReceiver<TunnelState>) -> TunnelState {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a state transition")
        .expect("state channel closed")
}

/// Collect states up to and including the first one matching `done`.
pub async fn states_until<F>(
    rx: &mut mpsc::UnboundedReceiver<TunnelState>,
    mut done: F,
) -> Vec<TunnelState>
where
    F: FnMut(&TunnelState) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let state = next_state(rx).await;
        let finished = done(&state);
        seen.push(state);
        if finished {
            return seen;
        }
    }
}

/// Read an HTTP header block (through the blank line) from `stream`.
pub async fn read_header_block<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut block = Vec::new();
    let mut byte = [0u8; 1];
    while !block.ends_with(b"\r\n\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut byte))
            .await
            .expect("timed out reading header block")
            .unwrap();
        assert_ne!(n, 0, "stream closed inside header block");
        block.push(byte[0]);
    }
    String::from_utf8(block).unwrap()
}

/// Read exactly `len` bytes with a timeout.
pub async fn read_exact_timeout<S: AsyncRead + Unpin>(stream: &mut S, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
        .await
        .expect("timed out reading")
        .unwrap();
    buf
}
