//! Linux TAP device.
//!
//! # Responsibilities
//! - Create (or attach to) a layer-2 interface through the `tun` crate
//! - Expose its async reader and writer to the relay loops
//! - Report the interface name the kernel assigned
//!
//! Bringing the interface up and addressing it is left to the system
//! (`ip link set tap0 up`).

use std::io;

use tokio::io::{ReadHalf, WriteHalf};
use tun::{AbstractDevice, AsyncDevice, Layer};

use crate::error::StartupError;
use crate::tap::TapIo;

/// Longest interface name the kernel accepts (`IFNAMSIZ` minus the NUL).
const MAX_NAME_LEN: usize = 15;

/// An attached TAP interface.
pub struct TapDevice {
    reader: ReadHalf<AsyncDevice>,
    writer: WriteHalf<AsyncDevice>,
    name: String,
}

/// Interface configuration for a TAP device named `name` (or kernel-chosen).
fn configuration(name: Option<&str>) -> Result<tun::Configuration, StartupError> {
    let mut config = tun::Configuration::default();
    config.layer(Layer::L2);
    if let Some(name) = name {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(StartupError::Tap(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("interface name '{}' is not a valid interface name", name),
            )));
        }
        config.tun_name(name);
    }
    Ok(config)
}

impl TapDevice {
    /// Attach to (or create) a TAP interface. `None` lets the kernel pick
    /// the name (`tap0`, `tap1`, ...).
    pub fn create(name: Option<&str>) -> Result<Self, StartupError> {
        let config = configuration(name)?;
        let device = tun::create_as_async(&config)
            .map_err(|e| StartupError::Tap(io::Error::other(e)))?;

        let name = device
            .tun_name()
            .map_err(|e| StartupError::Tap(io::Error::other(e)))?;
        let (reader, writer) = tokio::io::split(device);

        tracing::info!(interface = %name, "TAP device attached");
        Ok(Self {
            reader,
            writer,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TapIo for TapDevice {
    type Reader<'a> = &'a mut ReadHalf<AsyncDevice>;
    type Writer<'a> = &'a mut WriteHalf<AsyncDevice>;

    fn split(&mut self) -> (Self::Reader<'_>, Self::Writer<'_>) {
        (&mut self.reader, &mut self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlong_name_is_rejected() {
        let err = TapDevice::create(Some("a-name-well-past-ifnamsiz")).err().unwrap();
        assert!(matches!(err, StartupError::Tap(e) if e.kind() == io::ErrorKind::InvalidInput));
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(configuration(Some("")).is_err());
    }

    #[test]
    fn name_at_the_kernel_limit_is_accepted() {
        assert!(configuration(Some("tap-fifteen-chr")).is_ok());
        assert!(configuration(None).is_ok());
    }
}
