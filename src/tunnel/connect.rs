//! Connect role orchestrator.
//!
//! # States
//! ```text
//! Resolving → Connecting (each endpoint in resolver order) → WritingPreamble
//!     → Relaying → TeardownPending → ReconnectWait → Resolving ...
//! ```
//!
//! # Design Decisions
//! - Every failure is non-fatal: tear down, wait the fixed interval, retry
//! - Endpoint connect failures fall through to the next candidate; only an
//!   exhausted list arms the reconnect timer
//! - Exactly one reconnect wait is outstanding at a time because teardown
//!   always completes before the wait starts

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use crate::config::{RelayConfig, Role, TunnelConfig};
use crate::error::{OpError, TunnelError};
use crate::http::{request_preamble, HttpParser};
use crate::net::connection::ConnectionId;
use crate::net::{DnsResolver, HostPort, Resolve, Security, Transport};
use crate::observability::{metrics, spans};
use crate::tap::TapIo;
use crate::tunnel::session::{run_relay, teardown};
use crate::tunnel::state::{StateReporter, TunnelState};

/// Dials out to the configured peer and keeps the tunnel up.
pub struct ConnectMode<T, R = DnsResolver> {
    target: HostPort,
    reconnect_interval: Duration,
    relay: RelayConfig,
    transport: Transport,
    tap: T,
    parser: HttpParser,
    resolver: R,
    reporter: StateReporter,
}

impl<T: TapIo> ConnectMode<T> {
    pub fn new(config: &TunnelConfig, relay: RelayConfig, security: Security, tap: T) -> Self {
        Self {
            target: HostPort::split(&config.address),
            reconnect_interval: config.reconnect_interval(),
            relay,
            transport: Transport::new(security),
            tap,
            parser: HttpParser::new(),
            resolver: DnsResolver,
            reporter: StateReporter::default(),
        }
    }
}

impl<T: TapIo, R: Resolve> ConnectMode<T, R> {
    /// Swap the resolver, e.g. for a fixed endpoint list.
    pub fn with_resolver<R2: Resolve>(self, resolver: R2) -> ConnectMode<T, R2> {
        ConnectMode {
            target: self.target,
            reconnect_interval: self.reconnect_interval,
            relay: self.relay,
            transport: self.transport,
            tap: self.tap,
            parser: self.parser,
            resolver,
            reporter: self.reporter,
        }
    }

    /// Send every state transition to `tx`.
    pub fn with_state_reporter(mut self, tx: mpsc::UnboundedSender<TunnelState>) -> Self {
        self.reporter = StateReporter::new(tx);
        self
    }

    pub fn target(&self) -> &HostPort {
        &self.target
    }

    /// Run until `shutdown` fires. Never returns an error: every failure
    /// ends in a reconnect.
    pub async fn run(&mut self, shutdown: broadcast::Receiver<()>) {
        let span = spans::tunnel_span(Role::Connect, &self.target.to_string());
        self.run_cycles(shutdown).instrument(span).await
    }

    async fn run_cycles(&mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            reconnect_interval_ms = self.reconnect_interval.as_millis() as u64,
            "Connect orchestrator started"
        );

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

            self.reporter
                .report(TunnelState::ReconnectWait(self.reconnect_interval));
            metrics::record_reconnect();
            tracing::info!(
                delay_ms = self.reconnect_interval.as_millis() as u64,
                "Reconnect scheduled"
            );

            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.reconnect_interval) => {}
            }
        }

        tracing::info!("Connect orchestrator stopped");
        self.reporter.report(TunnelState::Stopped);
    }

    /// One resolve/connect/preamble/relay pass. Always ends in an error.
    async fn cycle(&mut self) -> TunnelError {
        if let Err(err) = self.establish().await {
            return err;
        }
        run_relay(
            Role::Connect,
            &mut self.transport,
            &mut self.tap,
            &mut self.parser,
            &self.relay,
            &self.reporter,
        )
        .await
    }

    async fn establish(&mut self) -> Result<(), TunnelError> {
        let host = self.target.host.clone();
        let port = self.target.port.clone();

        self.reporter.report(TunnelState::Resolving);
        let endpoints = self
            .resolver
            .resolve(&host, &port)
            .await
            .map_err(|source| TunnelError::Resolution {
                host: host.clone(),
                port: port.clone(),
                source,
            })?;
        tracing::debug!(count = endpoints.len(), "Address resolved");

        let peer = self.connect_any(&endpoints).await?;
        metrics::record_connection(Role::Connect);

        self.reporter.report(TunnelState::WritingPreamble);
        let authority_host = if host.contains(':') {
            format!("[{}]", host)
        } else {
            host
        };
        let preamble = request_preamble(&authority_host, &port);
        match self.transport.write(&mut preamble.as_bytes()).await {
            Ok(()) => {
                tracing::debug!(peer = %peer, "Request preamble written");
                Ok(())
            }
            Err(OpError::Aborted) => Err(TunnelError::Aborted),
            Err(OpError::Io(source)) => Err(TunnelError::PreambleWrite { peer, source }),
        }
    }

    /// Try each endpoint in order; the first success wins.
    async fn connect_any(&mut self, endpoints: &[SocketAddr]) -> Result<SocketAddr, TunnelError> {
        for &endpoint in endpoints {
            self.reporter.report(TunnelState::Connecting(endpoint));
            match self.transport.connect(endpoint, &self.target.host).await {
                Ok(()) => {
                    tracing::info!(endpoint = %endpoint, tls = self.transport.is_tls(), "Connected");
                    self.reporter.report(TunnelState::Connected(endpoint));
                    return Ok(endpoint);
                }
                Err(OpError::Aborted) => return Err(TunnelError::Aborted),
                Err(OpError::Io(e)) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Connect failed");
                    self.reporter.report(TunnelState::ConnectFailed(endpoint));
                }
            }
        }

        Err(TunnelError::Connection {
            host: self.target.host.clone(),
            port: self.target.port.clone(),
            attempted: endpoints.len(),
        })
    }
}
