//! Fixed handshake header blocks exchanged once per connection.

/// Sent by the listen role once the peer's request headers are in.
pub const RESPONSE_PREAMBLE: &str = "HTTP/1.1 200 OK\r\n\
    Transfer-Encoding: chunked\r\n\
    Content-Type: application/octet-stream\r\n\
    \r\n";

pub const USER_AGENT: &str = "secret-passage";

/// The connect role's POST request.
pub fn request_preamble(host: &str, port: &str) -> String {
    format!(
        "POST /tunnel HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         User-Agent: {USER_AGENT}\r\n\
         Accept: application/octet-stream\r\n\
         Transfer-Encoding: chunked\r\n\
         Content-Type: application/octet-stream\r\n\
         \r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_byte_exact() {
        assert_eq!(
            request_preamble("example.com", "443"),
            "POST /tunnel HTTP/1.1\r\nHost: example.com:443\r\nUser-Agent: secret-passage\r\n\
             Accept: application/octet-stream\r\nTransfer-Encoding: chunked\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        );
    }

    #[test]
    fn response_is_byte_exact() {
        assert_eq!(
            RESPONSE_PREAMBLE,
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Type: application/octet-stream\r\n\r\n"
        );
    }
}
