//! TCP listener for the listen role.
//!
//! # Responsibilities
//! - Resolve the configured bind address once
//! - Open, bind and listen with a backlog of one (a single tunnel at a time)
//! - Report bind/listen failures as fatal startup errors

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

use crate::error::StartupError;
use crate::net::address::HostPort;

/// Pending-connection queue length: one tunnel is served at a time.
pub const BACKLOG: u32 = 1;

/// A bound, listening socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Resolve `address` ("host[:port]") and listen on its first endpoint.
    pub async fn bind(address: &str) -> Result<Self, StartupError> {
        let hp = HostPort::split(address);
        tracing::debug!(host = %hp.host, port = %hp.port, "Resolving listen address");

        let port = hp.port_number().ok_or_else(|| StartupError::Resolve {
            address: address.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid port"),
        })?;
        let endpoint = tokio::net::lookup_host((hp.host.as_str(), port))
            .await
            .map_err(|source| StartupError::Resolve {
                address: address.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| StartupError::NoAddress(address.to_string()))?;
        tracing::debug!(endpoint = %endpoint, "Listen address resolved");

        Self::bind_endpoint(endpoint)
    }

    /// Listen on an already-resolved endpoint.
    pub fn bind_endpoint(endpoint: SocketAddr) -> Result<Self, StartupError> {
        let bind_err = |source| StartupError::Bind { endpoint, source };

        let socket = if endpoint.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(endpoint).map_err(bind_err)?;

        let inner = socket
            .listen(BACKLOG)
            .map_err(|source| StartupError::Listen { endpoint, source })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| StartupError::Listen { endpoint, source })?;

        tracing::info!(address = %local_addr, backlog = BACKLOG, "Listener bound");

        Ok(Self { inner, local_addr })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn as_tcp(&self) -> &TcpListener {
        &self.inner
    }
}
