//! Bridge host binary. Serves plugin slots and their parameters to browser
//! clients.
//!
//! Port: first argument, else `NOVA_BRIDGE_PORT`, else 8765. Exits when stdin
//! closes.

use nova_bridge::{BridgeConfig, BridgeServer, PluginHost, Result, DEFAULT_PORT};
use std::env;
use std::io;
use std::sync::Arc;

fn port() -> u16 {
    let Some(raw) = env::args().nth(1).or_else(|| env::var("NOVA_BRIDGE_PORT").ok()) else {
        return DEFAULT_PORT;
    };
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(value = %raw, "invalid port, using {DEFAULT_PORT}");
        DEFAULT_PORT
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut server = BridgeServer::new(BridgeConfig::with_port(port()))?;
    server.add_listener(Arc::new(PluginHost::new(server.sender())));
    let addr = server.start()?;
    tracing::info!(%addr, "nova bridge host running, close stdin to exit");

    io::copy(&mut io::stdin().lock(), &mut io::sink())?;
    server.stop()
}
