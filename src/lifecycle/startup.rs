//! Startup orchestration.
//!
//! # Responsibilities
//! - Take the pid-file lock and start the metrics exporter when configured
//! - Attach the TAP device and build the transport security
//! - Dispatch to the connect or listen orchestrator
//! - Translate SIGTERM/SIGINT into a graceful shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Once an orchestrator runs, nothing short of a signal stops it

use crate::config::{PassageConfig, Role, TunnelConfig};
use crate::error::StartupError;
use crate::lifecycle::pid_file::PidFile;
use crate::lifecycle::signals;
use crate::lifecycle::Shutdown;
use crate::net::tls::TlsContext;
use crate::net::Security;
use crate::observability::metrics;
use crate::tap::TapIo;
use crate::tunnel::{ConnectMode, ListenMode};

/// Plaintext unless a `[tunnel.tls]` section is present.
pub fn build_security(config: &TunnelConfig) -> Result<Security, StartupError> {
    match &config.tls {
        Some(tls) => Ok(Security::Tls(TlsContext::from_config(config.mode, tls)?)),
        None => Ok(Security::Plain),
    }
}

/// Run the configured role over `tap` until `shutdown` fires.
///
/// Returns early only for startup failures (TLS material, bind/listen).
pub async fn run_tunnel<T: TapIo>(
    config: &PassageConfig,
    tap: T,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    let stop = shutdown.subscribe();
    let security = build_security(&config.tunnel)?;

    tracing::info!(
        mode = %config.tunnel.mode,
        address = %config.tunnel.address,
        tls = config.tunnel.tls.is_some(),
        "Starting tunnel"
    );

    match config.tunnel.mode {
        Role::Connect => {
            let mut mode = ConnectMode::new(&config.tunnel, config.relay.clone(), security, tap);
            mode.run(stop).await;
        }
        Role::Listen => {
            let mut mode =
                ListenMode::bind(&config.tunnel.address, config.relay.clone(), security, tap)
                    .await?;
            mode.run(stop).await;
        }
    }
    Ok(())
}

/// The whole service: everything `run_tunnel` needs, plus signal handling.
#[cfg(target_os = "linux")]
pub async fn run(config: PassageConfig) -> Result<(), StartupError> {
    let _pid_file = config
        .service
        .pid_path
        .as_deref()
        .map(PidFile::acquire)
        .transpose()?;

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| StartupError::Metrics(format!("invalid address: {}", e)))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let tap = crate::tap::TapDevice::create(config.tap.name.as_deref())?;
    tracing::info!(interface = tap.name(), "TAP interface ready");

    let shutdown = Shutdown::new();
    let tunnel = run_tunnel(&config, tap, &shutdown);
    tokio::pin!(tunnel);

    tokio::select! {
        res = &mut tunnel => return res,
        signal = signals::wait_for_shutdown_signal() => {
            let signal = signal.map_err(StartupError::Signals)?;
            tracing::info!(signal, "Shutdown signal received");
            shutdown.trigger();
        }
    }

    tunnel.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub async fn run(_config: PassageConfig) -> Result<(), StartupError> {
    Err(StartupError::Tap(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "TAP devices are only supported on Linux",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_without_tls_section() {
        let config = TunnelConfig::default();
        assert!(matches!(build_security(&config), Ok(Security::Plain)));
    }

    #[test]
    fn missing_tls_material_is_fatal() {
        let mut config = TunnelConfig {
            mode: Role::Listen,
            ..TunnelConfig::default()
        };
        config.tls = Some(crate::config::TlsConfig {
            cert_path: Some("/nonexistent/cert.pem".into()),
            key_path: Some("/nonexistent/key.pem".into()),
            ..Default::default()
        });
        assert!(matches!(build_security(&config), Err(StartupError::Tls(_))));
    }
}
