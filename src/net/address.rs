//! "host[:port]" splitting.

/// Port used when the configured address carries none.
pub const DEFAULT_PORT: &str = "443";

/// A configured address split into its host and port parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: String,
}

impl HostPort {
    /// Split `address` at its port separator.
    ///
    /// Bracketed IPv6 (`[::1]:8443`) is supported. An unbracketed address
    /// with several colons is taken as a bare IPv6 host on the default port.
    pub fn split(address: &str) -> Self {
        let address = address.trim();

        if let Some(rest) = address.strip_prefix('[') {
            if let Some((host, tail)) = rest.split_once(']') {
                let port = tail.strip_prefix(':').unwrap_or(DEFAULT_PORT);
                return Self::new(host, port);
            }
        }

        match address.split_once(':') {
            Some((host, port)) if !port.contains(':') => Self::new(host, port),
            _ => Self::new(address, DEFAULT_PORT),
        }
    }

    fn new(host: &str, port: &str) -> Self {
        Self {
            host: host.to_string(),
            port: port.to_string(),
        }
    }

    /// The port as a number, if it is one.
    pub fn port_number(&self) -> Option<u16> {
        self.port.parse().ok()
    }
}

impl std::fmt::Display for HostPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_port_defaults_to_443() {
        let hp = HostPort::split("example.com");
        assert_eq!(hp.host, "example.com");
        assert_eq!(hp.port, "443");
        assert_eq!(hp.port_number(), Some(443));
    }

    #[test]
    fn explicit_port_is_kept() {
        let hp = HostPort::split("10.0.0.1:8080");
        assert_eq!(hp.host, "10.0.0.1");
        assert_eq!(hp.port, "8080");
    }

    #[test]
    fn bracketed_ipv6() {
        assert_eq!(HostPort::split("[::1]:8443"), HostPort::new("::1", "8443"));
        assert_eq!(HostPort::split("[fe80::1]"), HostPort::new("fe80::1", "443"));
        assert_eq!(HostPort::split("[::1]:8443").to_string(), "[::1]:8443");
    }

    #[test]
    fn bare_ipv6_uses_default_port() {
        assert_eq!(HostPort::split("fe80::1"), HostPort::new("fe80::1", "443"));
    }

    #[test]
    fn non_numeric_port_is_reported() {
        assert_eq!(HostPort::split("example.com:https").port_number(), None);
    }
}
