//! One relaying session over an established transport, shared by both roles.

use tokio_util::sync::CancellationToken;

use crate::config::{RelayConfig, Role};
use crate::error::{OpError, TunnelError};
use crate::http::{HttpParser, ParsedMessage, RESPONSE_PREAMBLE};
use crate::net::{CancellableIo, Transport};
use crate::observability::metrics;
use crate::relay::{http_to_tap, tap_to_http, HeaderGate, LoopStopReason, StopSignal};
use crate::tap::TapIo;
use crate::tunnel::state::{StateReporter, TunnelState};

/// Run both relay loops until one of them reports a stop reason.
///
/// The inbound loop starts immediately and parses the peer's preamble; the
/// outbound loop waits for the header gate (listen role writes the 200
/// preamble first). On the first stop reason both the transport and TAP
/// operations are cancelled and the remaining loop is drained, so nothing is
/// left pending when this returns.
pub(crate) async fn run_relay<T: TapIo>(
    role: Role,
    transport: &mut Transport,
    tap: &mut T,
    parser: &mut HttpParser,
    config: &RelayConfig,
    reporter: &StateReporter,
) -> TunnelError {
    let transport_cancel = transport.cancel_token();
    let tap_cancel = CancellationToken::new();
    let Some((sock_reader, sock_writer)) = transport.halves() else {
        return TunnelError::NotConnected;
    };
    let (tap_reader, tap_writer) = tap.split();
    let mut tap_reader = CancellableIo::new(tap_reader, tap_cancel.clone());
    let mut tap_writer = CancellableIo::new(tap_writer, tap_cancel.clone());

    let (stop, mut stopped) = StopSignal::channel();
    let stop = &stop;
    let (mut gate, opened) = HeaderGate::new(role);
    let tap_read_size = config.tap_read_size;

    // The gate moves into the inbound loop; when that loop ends without
    // opening it, `opened` errors and the outbound side never starts.
    let inbound = http_to_tap(
        sock_reader,
        &mut tap_writer,
        parser,
        config.socket_read_size,
        move |message: &ParsedMessage| gate.admit(message),
        stop,
    );

    let outbound = async move {
        if opened.await.is_err() {
            return;
        }
        if role == Role::Listen {
            match sock_writer.write_all(RESPONSE_PREAMBLE.as_bytes()).await {
                Ok(()) => tracing::debug!("Response preamble written"),
                Err(OpError::Aborted) => return,
                Err(OpError::Io(e)) => {
                    tracing::warn!(error = %e, "Failed to write response preamble");
                    stop.stop(LoopStopReason::SocketWriteError);
                    return;
                }
            }
        }
        reporter.report(TunnelState::Relaying);
        tap_to_http(&mut tap_reader, sock_writer, tap_read_size, stop).await;
    };

    let relay = async move {
        tokio::join!(inbound, outbound);
    };
    tokio::pin!(relay);

    let reason = tokio::select! {
        biased;
        Some(reason) = stopped.recv() => {
            transport_cancel.cancel();
            tap_cancel.cancel();
            (&mut relay).await;
            reason
        }
        () = &mut relay => match stopped.try_recv() {
            Ok(reason) => reason,
            Err(_) => return TunnelError::Aborted,
        },
    };

    tracing::info!(reason = %reason, "Relay stopped");
    metrics::record_loop_stop(reason);
    reporter.report(TunnelState::RelayStopped(reason));
    TunnelError::Relay(reason)
}

/// Cancel, shut down and close the transport, then reset the parser.
/// Idempotent; a closed transport produces no teardown transition.
pub(crate) async fn teardown(
    transport: &mut Transport,
    parser: &mut HttpParser,
    reporter: &StateReporter,
) {
    if transport.is_open() {
        reporter.report(TunnelState::TeardownPending);
        transport.cancel();
        if let Err(e) = transport.shutdown().await {
            tracing::debug!(error = %e, "Transport shutdown failed");
        }
        transport.close();
    }
    parser.reset();
}
