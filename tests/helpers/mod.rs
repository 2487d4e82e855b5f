//! Test helpers and fixtures for Nova integration tests
//!
//! Sessions are driven deterministically: a [`ManualClock`] stands in for the
//! audio clock and tests call `tick()` themselves instead of relying on the
//! scheduler thread.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Values written verbatim
//! - `CURVE_EPSILON` (1e-4): Interpolated values
//! - `TIME_EPSILON` (1e-9): Click and transport times

#![allow(dead_code)]

pub mod tolerances;

#[cfg(feature = "bridge")]
pub mod host;

use nova::prelude::*;
use nova::{AtomicDouble, AudioClock, ClickEvent, TickReport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Audio clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicDouble,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn advance(&self, delta: f64) {
        self.now.set(self.now.get() + delta);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Session on a manual clock without the scheduler thread.
pub fn test_session() -> (AudioSession, Arc<ManualClock>) {
    test_session_with(AudioSession::builder())
}

/// Like [`test_session`], starting from a configured builder.
pub fn test_session_with(builder: AudioSessionBuilder) -> (AudioSession, Arc<ManualClock>) {
    let clock = ManualClock::new();
    let session = builder
        .clock(clock.clone())
        .scheduler_thread(false)
        .build()
        .expect("Failed to create test session");
    (session, clock)
}

/// Advance the clock and the transport by `step` seconds, `count` times,
/// ticking after each step.
pub fn drive(session: &AudioSession, clock: &ManualClock, step: f64, count: usize) -> Vec<TickReport> {
    (0..count)
        .map(|_| {
            clock.advance(step);
            session.transport().advance(step);
            session.tick()
        })
        .collect()
}

/// Every click scheduled so far.
pub fn drain_clicks(session: &AudioSession) -> Vec<ClickEvent> {
    session
        .clicks()
        .expect("session owns no click channel")
        .try_iter()
        .collect()
}

/// Parameter target remembering every value written to it.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    values: Mutex<Vec<f32>>,
}

impl RecordingTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn values(&self) -> Vec<f32> {
        self.values.lock().clone()
    }

    pub fn last(&self) -> Option<f32> {
        self.values.lock().last().copied()
    }
}

impl ParameterTarget for RecordingTarget {
    fn apply(&self, value: f32) {
        self.values.lock().push(value);
    }
}

/// Poll `condition` every millisecond until it holds or `max_wait_ms` passes.
pub fn wait_until(max_wait_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(max_wait_ms);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
