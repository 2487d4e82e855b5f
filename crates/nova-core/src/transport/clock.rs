use std::time::Instant;

/// Time base of the audio backend, in seconds.
///
/// Click events are stamped in this time base; the backend owns the final
/// sample-accurate start time.
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Monotonic clock starting at zero when constructed.
#[derive(Debug, Clone, Copy)]
pub struct SystemAudioClock {
    origin: Instant,
}

impl SystemAudioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemAudioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemAudioClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}
