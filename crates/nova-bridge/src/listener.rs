//! Listener registration and the dispatcher thread.
//!
//! The I/O thread never calls listeners directly: it queues a
//! [`BridgeEvent`] and the dispatcher delivers it to a snapshot of the
//! listener set.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives bridge traffic on the dispatcher thread.
pub trait BridgeListener: Send + Sync {
    fn on_message(&self, client_id: &str, message: &Value);

    fn on_client_connected(&self, _client_id: &str) {}

    fn on_client_disconnected(&self, _client_id: &str) {}
}

/// Handle returned by [`BridgeServer::add_listener`](crate::BridgeServer::add_listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    ClientConnected(String),
    ClientDisconnected(String),
    Message { client_id: String, message: Value },
}

/// Forwards every event into a channel, for callers that prefer polling.
impl BridgeListener for Sender<BridgeEvent> {
    fn on_message(&self, client_id: &str, message: &Value) {
        let _ = self.send(BridgeEvent::Message {
            client_id: client_id.to_owned(),
            message: message.clone(),
        });
    }

    fn on_client_connected(&self, client_id: &str) {
        let _ = self.send(BridgeEvent::ClientConnected(client_id.to_owned()));
    }

    fn on_client_disconnected(&self, client_id: &str) {
        let _ = self.send(BridgeEvent::ClientDisconnected(client_id.to_owned()));
    }
}

#[derive(Debug)]
pub(crate) enum Dispatch {
    Event(BridgeEvent),
    Shutdown,
}

#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: Mutex<Vec<(ListenerId, Arc<dyn BridgeListener>)>>,
    next_id: AtomicU64,
}

impl ListenerSet {
    pub(crate) fn add(&self, listener: Arc<dyn BridgeListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    fn snapshot(&self) -> Vec<Arc<dyn BridgeListener>> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

/// Dispatcher thread body. Runs until `Shutdown` or every sender is gone.
pub(crate) fn run_dispatcher(rx: Receiver<Dispatch>, listeners: Arc<ListenerSet>) {
    while let Ok(Dispatch::Event(event)) = rx.recv() {
        for listener in listeners.snapshot() {
            match &event {
                BridgeEvent::ClientConnected(id) => listener.on_client_connected(id),
                BridgeEvent::ClientDisconnected(id) => listener.on_client_disconnected(id),
                BridgeEvent::Message { client_id, message } => {
                    listener.on_message(client_id, message)
                }
            }
        }
    }
    tracing::debug!("bridge dispatcher exiting");
}
