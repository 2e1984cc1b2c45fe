//! Listen role orchestrator.
//!
//! # States
//! ```text
//! Listening (once) → Accepting → AwaitingRequest → Relaying
//!     → TeardownPending → Accepting ...
//! ```
//!
//! One tunnel is served at a time. Failed accepts are retried immediately;
//! a finished or failed tunnel goes straight back to accepting.

use std::net::SocketAddr;

use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use crate::config::{RelayConfig, Role};
use crate::error::{OpError, StartupError, TunnelError};
use crate::http::HttpParser;
use crate::net::connection::ConnectionId;
use crate::net::{Listener, Security, Transport};
use crate::observability::{metrics, spans};
use crate::tap::TapIo;
use crate::tunnel::session::{run_relay, teardown};
use crate::tunnel::state::{StateReporter, TunnelState};

/// Accepts tunnel connections on a bound listener.
pub struct ListenMode<T> {
    listener: Listener,
    relay: RelayConfig,
    transport: Transport,
    tap: T,
    parser: HttpParser,
    reporter: StateReporter,
}

impl<T: TapIo> ListenMode<T> {
    pub fn new(listener: Listener, relay: RelayConfig, security: Security, tap: T) -> Self {
        Self {
            listener,
            relay,
            transport: Transport::new(security),
            tap,
            parser: HttpParser::new(),
            reporter: StateReporter::default(),
        }
    }

    /// Resolve and bind `address`. Failures here are fatal.
    pub async fn bind(
        address: &str,
        relay: RelayConfig,
        security: Security,
        tap: T,
    ) -> Result<Self, StartupError> {
        let listener = Listener::bind(address).await?;
        Ok(Self::new(listener, relay, security, tap))
    }

    pub fn with_state_reporter(mut self, tx: mpsc::UnboundedSender<TunnelState>) -> Self {
        self.reporter = StateReporter::new(tx);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Serve tunnels until `shutdown` fires.
    pub async fn run(&mut self, shutdown: broadcast::Receiver<()>) {
        let span = spans::tunnel_span(Role::Listen, &self.local_addr().to_string());
        self.run_cycles(shutdown).instrument(span).await
    }

    async fn run_cycles(&mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Listen orchestrator started");
        self.reporter.report(TunnelState::Listening(self.local_addr()));

        loop {
            let id = ConnectionId::next();
            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => None,
                err = self.cycle().instrument(spans::connection_span(id)) => Some(err),
            };

            teardown(&mut self.transport, &mut self.parser, &self.reporter).await;

            match outcome {
                None => break,
                Some(err) => tracing::warn!(connection = %id, error = %err, "Tunnel connection ended"),
            }
        }

        tracing::info!("Listen orchestrator stopped");
        self.reporter.report(TunnelState::Stopped);
    }

    /// Accept one peer and relay until something fails.
    async fn cycle(&mut self) -> TunnelError {
        self.reporter.report(TunnelState::Accepting);
        let peer = loop {
            match self.transport.accept(self.listener.as_tcp()).await {
                Ok(peer) => break peer,
                Err(OpError::Aborted) => return TunnelError::Aborted,
                Err(OpError::Io(e)) => {
                    tracing::warn!(error = %e, "Accept failed, retrying");
                }
            }
        };

        tracing::info!(peer = %peer, tls = self.transport.is_tls(), "Peer accepted");
        metrics::record_connection(Role::Listen);
        self.reporter.report(TunnelState::Accepted(peer));
        self.reporter.report(TunnelState::AwaitingRequest);

        run_relay(
            Role::Listen,
            &mut self.transport,
            &mut self.tap,
            &mut self.parser,
            &self.relay,
            &self.reporter,
        )
        .await
    }
}
