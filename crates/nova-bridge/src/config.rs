//! Bridge server configuration.

use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8765;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub bind_addr: IpAddr,
    /// 0 binds an ephemeral port; see [`BridgeServer::local_addr`](crate::BridgeServer::local_addr).
    pub port: u16,
    /// How long a new connection may take to send its upgrade request.
    pub handshake_timeout: Duration,
    /// Sleep between accept/poll iterations.
    pub poll_interval: Duration,
    /// Bound on joining the I/O and dispatcher threads at stop.
    pub join_timeout: Duration,
    /// Bytes read from a client per poll.
    pub read_buffer_size: usize,
    /// Largest buffered, not yet complete message before the client is dropped.
    pub max_message_size: usize,
    /// Bound on a single blocking write to a client.
    pub write_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            handshake_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
            join_timeout: Duration::from_secs(3),
            read_buffer_size: 64 * 1024,
            max_message_size: 16 * 1024 * 1024,
            write_timeout: Duration::from_secs(1),
        }
    }
}

impl BridgeConfig {
    /// Default config on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(BridgeError::InvalidConfig(
                "read_buffer_size must be non-zero".into(),
            ));
        }
        if self.max_message_size < self.read_buffer_size {
            return Err(BridgeError::InvalidConfig(format!(
                "max_message_size {} is smaller than read_buffer_size {}",
                self.max_message_size, self.read_buffer_size
            )));
        }
        for (name, value) in [
            ("handshake_timeout", self.handshake_timeout),
            ("join_timeout", self.join_timeout),
            ("write_timeout", self.write_timeout),
        ] {
            if value.is_zero() {
                return Err(BridgeError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        if self.poll_interval > Duration::from_millis(100) {
            return Err(BridgeError::InvalidConfig(format!(
                "poll_interval {:?} exceeds 100ms",
                self.poll_interval
            )));
        }
        Ok(())
    }
}
