//! Minimal native host stand-in: a loopback client speaking the bridge protocol.

use nova::bridge::frame::{self, Opcode};
use nova::bridge::handshake;
use serde_json::Value;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

pub struct TestHost {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TestHost {
    /// Connect and complete the upgrade handshake.
    pub fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).expect("connect to bridge");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let request = format!(
            "GET / HTTP/1.1\r\nHost: {addr}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
             Sec-WebSocket-Key: {KEY}\r\nSec-WebSocket-Version: 13\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).unwrap();

        let mut host = Self {
            stream,
            buf: Vec::new(),
        };
        let end = loop {
            if let Some(end) = handshake::head_end(&host.buf) {
                break end;
            }
            assert!(host.fill(), "bridge closed during handshake");
        };
        let head = String::from_utf8_lossy(&host.buf[..end]).into_owned();
        host.buf.drain(..end);
        assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {head}");
        host
    }

    /// Read more bytes. Returns false on timeout or close.
    fn fill(&mut self) -> bool {
        let mut chunk = [0u8; 4096];
        match self.stream.read(&mut chunk) {
            Ok(0) => false,
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                true
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => false,
            Err(e) => panic!("host read failed: {e}"),
        }
    }

    pub fn send(&mut self, message: &Value) {
        let payload = serde_json::to_vec(message).unwrap();
        let bytes = frame::encode_frame(Opcode::Text, &payload, Some([7, 7, 7, 7]));
        self.stream.write_all(&bytes).unwrap();
    }

    /// Next JSON message, or `None` if nothing arrives within `timeout`.
    pub fn recv_within(&mut self, timeout: Duration) -> Option<Value> {
        self.stream.set_read_timeout(Some(timeout)).unwrap();
        loop {
            if let Some((frame, used)) = frame::parse(&self.buf) {
                self.buf.drain(..used);
                if frame.opcode.is_data() {
                    return serde_json::from_slice(&frame.payload).ok();
                }
                continue;
            }
            if !self.fill() {
                return None;
            }
        }
    }

    pub fn recv(&mut self) -> Value {
        self.recv_within(Duration::from_secs(2))
            .expect("no message from bridge")
    }

    /// True once the bridge has closed the connection.
    pub fn is_closed(&mut self) -> bool {
        self.stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut chunk = [0u8; 64];
        matches!(self.stream.read(&mut chunk), Ok(0) | Err(_))
    }
}
