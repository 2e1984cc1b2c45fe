//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::config::{Role, TlsConfig};
use crate::error::StartupError;

/// Role-specific TLS state, built once at startup.
#[derive(Clone)]
pub enum TlsContext {
    Client {
        connector: TlsConnector,
        /// SNI override; `None` means "use the host being dialled".
        server_name: Option<String>,
    },
    Server {
        acceptor: TlsAcceptor,
    },
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsContext::Client { server_name, .. } => f
                .debug_struct("Client")
                .field("server_name", server_name)
                .finish_non_exhaustive(),
            TlsContext::Server { .. } => f.debug_struct("Server").finish_non_exhaustive(),
        }
    }
}

impl TlsContext {
    /// Build the TLS state the given role needs.
    pub fn from_config(role: Role, config: &TlsConfig) -> Result<Self, StartupError> {
        match role {
            Role::Connect => {
                let ca_path = config
                    .ca_path
                    .as_deref()
                    .ok_or_else(|| StartupError::Tls("ca_path is required to connect".into()))?;
                let client = client_config(ca_path)?;
                Ok(TlsContext::Client {
                    connector: TlsConnector::from(Arc::new(client)),
                    server_name: config.server_name.clone(),
                })
            }
            Role::Listen => {
                let (cert_path, key_path) = match (&config.cert_path, &config.key_path) {
                    (Some(cert), Some(key)) => (cert, key),
                    _ => {
                        return Err(StartupError::Tls(
                            "cert_path and key_path are required to listen".into(),
                        ))
                    }
                };
                let server = server_config(cert_path, key_path)?;
                Ok(TlsContext::Server {
                    acceptor: TlsAcceptor::from(Arc::new(server)),
                })
            }
        }
    }
}

fn client_config(ca_path: &Path) -> Result<ClientConfig, StartupError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca_path)? {
        roots
            .add(cert)
            .map_err(|e| StartupError::Tls(format!("invalid CA certificate in {:?}: {}", ca_path, e)))?;
    }

    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| StartupError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

fn server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, StartupError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| StartupError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| StartupError::Tls(format!("certificate/key mismatch: {}", e)))
}

fn open(path: &Path) -> Result<BufReader<File>, StartupError> {
    // Basic validation
    if !path.exists() {
        return Err(StartupError::Tls(format!("file not found: {:?}", path)));
    }
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| StartupError::Tls(format!("failed to open {:?}: {}", path, e)))
}

/// Load every certificate from a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, StartupError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StartupError::Tls(format!("failed to parse {:?}: {}", path, e)))?;
    if certs.is_empty() {
        return Err(StartupError::Tls(format!("no certificates in {:?}", path)));
    }
    Ok(certs)
}

/// Load the first private key from a PEM file.
pub fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, StartupError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| StartupError::Tls(format!("failed to parse {:?}: {}", path, e)))?
        .ok_or_else(|| StartupError::Tls(format!("no private key in {:?}", path)))
}
