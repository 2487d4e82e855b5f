use super::TransportSource;
use crate::lockfree::{AtomicDouble, AtomicFlag};

/// Shared transport position written by transport controls and read by the
/// scheduler thread.
#[derive(Debug, Default)]
pub struct TransportState {
    time: AtomicDouble,
    playing: AtomicFlag,
}

impl TransportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&self) {
        self.playing.set(true);
    }

    pub fn stop(&self) {
        self.playing.set(false);
    }

    /// Move the playhead. Negative positions clamp to zero.
    pub fn seek(&self, seconds: f64) {
        self.time.set(seconds.max(0.0));
    }

    /// Advance the playhead by `delta` seconds if playing.
    pub fn advance(&self, delta: f64) {
        if self.playing.get() {
            self.time.set(self.time.get() + delta);
        }
    }
}

impl TransportSource for TransportState {
    fn current_time(&self) -> f64 {
        self.time.get()
    }

    fn is_playing(&self) -> bool {
        self.playing.get()
    }
}
