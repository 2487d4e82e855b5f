//! Best-effort UI value notifications.
//!
//! Each parameter has one slot; a write overwrites the previous value, so a
//! slow UI only ever sees the latest value and never backs up the engine.

use dashmap::DashMap;
use nova_core::AtomicFloat;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Slot {
    value: AtomicFloat,
    version: AtomicU64,
}

/// Receiving end for one parameter's value updates.
#[derive(Debug)]
pub struct ValueSubscription {
    param_id: String,
    slot: Arc<Slot>,
    seen: u64,
}

impl ValueSubscription {
    pub fn param_id(&self) -> &str {
        &self.param_id
    }

    /// The newest value published since the last call, if any.
    pub fn try_recv(&mut self) -> Option<f32> {
        let version = self.slot.version.load(Ordering::Acquire);
        if version == self.seen {
            return None;
        }
        self.seen = version;
        Some(self.slot.value.get())
    }

    /// The newest value ever published, without consuming it.
    pub fn latest(&self) -> Option<f32> {
        (self.slot.version.load(Ordering::Acquire) > 0).then(|| self.slot.value.get())
    }
}

/// Single-slot-per-parameter notification channel.
#[derive(Debug, Default)]
pub struct ValueNotifier {
    slots: DashMap<String, Arc<Slot>>,
}

impl ValueNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `param_id`. Subscribers share the slot; each keeps its own
    /// read position.
    pub fn subscribe(&self, param_id: &str) -> ValueSubscription {
        let slot = Arc::clone(self.slots.entry(param_id.to_owned()).or_default().value());
        let seen = slot.version.load(Ordering::Acquire);
        ValueSubscription {
            param_id: param_id.to_owned(),
            slot,
            seen,
        }
    }

    /// Publish `value`. Dropped when nobody ever subscribed to `param_id`.
    pub fn notify(&self, param_id: &str, value: f32) -> bool {
        let Some(slot) = self.slots.get(param_id) else {
            return false;
        };
        slot.value.set(value);
        slot.version.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Forget slots whose subscriptions have all been dropped.
    pub fn prune(&self) {
        self.slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}
