//! HTTP upgrade handshake.

use base64::Engine as _;
use sha1::{Digest, Sha1};
use thiserror::Error;

/// Fixed GUID appended to the client key before hashing.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Largest request head accepted before the connection is dropped.
pub const MAX_REQUEST_SIZE: usize = 8 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("request is not a websocket upgrade")]
    NotUpgrade,

    #[error("upgrade request has no Sec-WebSocket-Key")]
    MissingKey,

    #[error("request head exceeds 8 KiB")]
    TooLarge,

    #[error("no complete request within the handshake timeout")]
    Timeout,
}

/// A parsed upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub key: String,
}

impl UpgradeRequest {
    /// Parse a request head.
    ///
    /// Header names match case-insensitively. The request qualifies when an
    /// `Upgrade` header names `websocket`.
    pub fn parse(request: &str) -> Result<Self, HandshakeError> {
        let mut is_upgrade = false;
        let mut key = None;

        for line in request.lines().skip(1) {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.eq_ignore_ascii_case("upgrade") {
                is_upgrade |= value
                    .split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case("websocket"));
            } else if name.eq_ignore_ascii_case("sec-websocket-key") && !value.is_empty() {
                key = Some(value.to_owned());
            }
        }

        if !is_upgrade {
            return Err(HandshakeError::NotUpgrade);
        }
        let key = key.ok_or(HandshakeError::MissingKey)?;
        Ok(Self { key })
    }

    pub fn accept_key(&self) -> String {
        accept_key(&self.key)
    }

    /// The full `101 Switching Protocols` response for this request.
    pub fn response(&self) -> String {
        switching_protocols(&self.accept_key())
    }
}

/// `base64(SHA-1(key + GUID))`.
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

pub fn switching_protocols(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    )
}

/// Offset just past the blank line ending the request head, if present.
pub fn head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = "GET /chat HTTP/1.1\r\n\
        Host: localhost:8765\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[test]
    fn test_rfc_accept_vector() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_parse_upgrade_request() {
        let request = UpgradeRequest::parse(REQUEST).unwrap();
        assert_eq!(request.key, "dGhlIHNhbXBsZSBub25jZQ==");

        let response = request.response();
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_header_names_case_insensitive() {
        let request = "GET / HTTP/1.1\r\nupgrade: WebSocket\r\nsec-websocket-key: abc\r\n\r\n";
        assert_eq!(UpgradeRequest::parse(request).unwrap().key, "abc");
    }

    #[test]
    fn test_plain_http_rejected() {
        let request = "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(
            UpgradeRequest::parse(request),
            Err(HandshakeError::NotUpgrade)
        );
    }

    #[test]
    fn test_missing_key_rejected() {
        let request = "GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";
        assert_eq!(
            UpgradeRequest::parse(request),
            Err(HandshakeError::MissingKey)
        );
    }

    #[test]
    fn test_head_end() {
        assert_eq!(head_end(b"GET / HTTP/1.1\r\n"), None);
        let buf = b"GET / HTTP/1.1\r\n\r\n\x81\x00";
        assert_eq!(head_end(buf), Some(18));
    }
}
