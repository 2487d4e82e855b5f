//! Bridge protocol server for Nova.
//!
//! Connects the browser audio graph to an out-of-process native plugin host.
//! Clients open a plain TCP connection, upgrade it with an HTTP handshake,
//! and then exchange JSON messages in WebSocket-style frames.
//!
//! # Example
//!
//! ```ignore
//! use nova_bridge::{BridgeConfig, BridgeEvent, BridgeServer};
//! use std::sync::Arc;
//!
//! let mut server = BridgeServer::new(BridgeConfig::default())?;
//! let (tx, rx) = crossbeam_channel::unbounded::<BridgeEvent>();
//! server.add_listener(Arc::new(tx));
//! server.start()?;
//!
//! // Listener callbacks run on the dispatcher thread, never the I/O thread.
//! for event in rx.iter() {
//!     if let BridgeEvent::Message { client_id, message } = event {
//!         server.send(&client_id, &message)?;
//!     }
//! }
//! ```

pub mod error;
pub use error::{BridgeError, Result};

mod config;
pub use config::{BridgeConfig, DEFAULT_PORT};

pub mod frame;
pub use frame::encode_frame_base64;

pub mod handshake;
pub use handshake::HandshakeError;

mod host;
pub use host::PluginHost;

mod listener;
pub use listener::{BridgeEvent, BridgeListener, ListenerId};

pub mod message;
pub use message::ParameterUpdate;

mod server;
pub use server::{BridgeSender, BridgeServer};
