//! Address resolution seam.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

/// Resolve a host/port pair to candidate endpoints, in preference order.
pub trait Resolve {
    fn resolve(
        &self,
        host: &str,
        port: &str,
    ) -> impl Future<Output = io::Result<Vec<SocketAddr>>> + Send;
}

/// System resolver (getaddrinfo via Tokio's blocking pool).
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

impl Resolve for DnsResolver {
    async fn resolve(&self, host: &str, port: &str) -> io::Result<Vec<SocketAddr>> {
        let port: u16 = port.parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid port '{}'", port))
        })?;
        let endpoints: Vec<SocketAddr> = tokio::net::lookup_host((host, port)).await?.collect();
        if endpoints.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' resolved to no addresses", host),
            ));
        }
        Ok(endpoints)
    }
}

/// A fixed endpoint list, handy when the peer address is already known.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    endpoints: Vec<SocketAddr>,
}

impl StaticResolver {
    pub fn new(endpoints: Vec<SocketAddr>) -> Self {
        Self { endpoints }
    }
}

impl Resolve for StaticResolver {
    async fn resolve(&self, host: &str, port: &str) -> io::Result<Vec<SocketAddr>> {
        if self.endpoints.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no endpoints configured for '{}:{}'", host, port),
            ));
        }
        Ok(self.endpoints.clone())
    }
}
