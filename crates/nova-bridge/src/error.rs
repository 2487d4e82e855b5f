//! Error types for the bridge server

use crate::handshake::HandshakeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Bridge server already running")]
    AlreadyRunning,

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Timeout after {duration_ms}ms joining {thread} thread")]
    JoinTimeout { thread: String, duration_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::JoinTimeout {
            thread: "nova-bridge-io".into(),
            duration_ms: 3000,
        };
        assert_eq!(
            err.to_string(),
            "Timeout after 3000ms joining nova-bridge-io thread"
        );

        let err: BridgeError = HandshakeError::MissingKey.into();
        assert!(err.to_string().contains("Sec-WebSocket-Key"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: BridgeError = io.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
