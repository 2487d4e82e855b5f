//! Look-ahead click scheduler.
//!
//! A coarse poll timer (~25 ms) calls [`MetronomeScheduler::tick`] with the
//! audio clock's current time. Every click whose start time falls inside the
//! look-ahead window is handed to the [`ClickSink`] with its exact start time,
//! so the audio backend, not the poll timer, decides final timing.

use super::{ClickEvent, ClickSink, ClickSound, MetronomeConfig};
use crate::{Error, Result};

/// Invoked once when a count-in finishes.
pub type CountInCallback = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
}

struct CountIn {
    remaining: u32,
    on_complete: Option<CountInCallback>,
}

/// Look-ahead metronome scheduler.
pub struct MetronomeScheduler {
    config: MetronomeConfig,
    sink: Box<dyn ClickSink>,
    state: SchedulerState,
    next_click_time: f64,
    current_beat: u32,
    count_in: Option<CountIn>,
}

impl MetronomeScheduler {
    pub fn new(config: MetronomeConfig, sink: impl ClickSink + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink: Box::new(sink),
            state: SchedulerState::Idle,
            next_click_time: 0.0,
            current_beat: 0,
            count_in: None,
        })
    }

    pub fn config(&self) -> &MetronomeConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    /// Beat index within the bar of the next click to be scheduled.
    pub fn current_beat(&self) -> u32 {
        self.current_beat
    }

    /// Audio clock time of the next click to be scheduled.
    pub fn next_click_time(&self) -> f64 {
        self.next_click_time
    }

    /// Beats left in the active count-in, if any.
    pub fn count_in_remaining(&self) -> Option<u32> {
        self.count_in.as_ref().map(|c| c.remaining)
    }

    pub fn is_counting_in(&self) -> bool {
        self.count_in.is_some()
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !(20.0..=999.0).contains(&bpm) {
            return Err(Error::InvalidTempo(bpm));
        }
        self.config.bpm = bpm;
        Ok(())
    }

    pub fn set_time_signature(&mut self, beats_per_bar: u32, beat_unit: u32) -> Result<()> {
        if beats_per_bar == 0 || !beat_unit.is_power_of_two() {
            return Err(Error::InvalidTimeSignature {
                numerator: beats_per_bar,
                denominator: beat_unit,
            });
        }
        self.config.beats_per_bar = beats_per_bar;
        self.config.beat_unit = beat_unit;
        self.current_beat %= beats_per_bar;
        Ok(())
    }

    pub fn set_sound(&mut self, sound: ClickSound) {
        self.config.sound = sound;
    }

    pub fn set_accent(&mut self, accent: bool) {
        self.config.accent = accent;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.config.volume = volume.clamp(0.0, 1.0);
    }

    /// Whether clicks keep running after a count-in completes.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    // =========================================================================
    // Run control
    // =========================================================================

    /// Start clicking from the downbeat at `now`. No-op while running.
    pub fn start(&mut self, now: f64) {
        if self.is_running() {
            return;
        }
        self.state = SchedulerState::Running;
        self.current_beat = 0;
        self.next_click_time = now;
        self.count_in = None;
        tracing::debug!(now, bpm = self.config.bpm, "metronome started");
    }

    /// Start a count-in of `bars` bars from the downbeat at `now`.
    ///
    /// `on_complete` runs exactly once, after the last count-in beat has been
    /// scheduled. A count-in replaces any running one.
    pub fn start_count_in(
        &mut self,
        now: f64,
        bars: u32,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        let remaining = match bars.checked_mul(self.config.beats_per_bar) {
            Some(beats) if beats > 0 => beats,
            _ => return Err(Error::InvalidCountIn(bars)),
        };
        self.state = SchedulerState::Running;
        self.current_beat = 0;
        self.next_click_time = now;
        self.count_in = Some(CountIn {
            remaining,
            on_complete: Some(Box::new(on_complete)),
        });
        tracing::debug!(now, bars, "count-in started");
        Ok(())
    }

    /// Stop synchronously: drops any pending count-in and resets beat state.
    pub fn stop(&mut self) {
        self.state = SchedulerState::Idle;
        self.count_in = None;
        self.current_beat = 0;
        self.next_click_time = 0.0;
    }

    /// Realign beat phase to an external transport position.
    ///
    /// `transport_time` is the transport position in seconds, `now` the audio
    /// clock time at which that position was sampled. The next click lands on
    /// the next whole beat of the transport.
    pub fn sync_to_time(&mut self, transport_time: f64, now: f64) {
        if !self.is_running() {
            return;
        }
        let beat_duration = self.config.beat_duration();
        let beats = transport_time.max(0.0) / beat_duration;
        let next_beat = beats.ceil();

        self.current_beat = (next_beat as u64 % self.config.beats_per_bar as u64) as u32;
        self.next_click_time = now + (next_beat - beats) * beat_duration;
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Schedule every click inside `[.., now + schedule_ahead)` and run the
    /// count-in callback if the count-in finished during this tick.
    ///
    /// Returns the number of clicks scheduled.
    pub fn tick(&mut self, now: f64) -> usize {
        let (scheduled, completed) = self.tick_deferred(now);
        if let Some(on_complete) = completed {
            on_complete();
        }
        scheduled
    }

    /// Like [`tick`](Self::tick) but hands the count-in callback back to the
    /// caller, so it can run after any lock around the scheduler is released.
    pub fn tick_deferred(&mut self, now: f64) -> (usize, Option<CountInCallback>) {
        let horizon = now + self.config.schedule_ahead;
        let mut scheduled = 0;
        let mut completed = None;

        while self.is_running() && self.next_click_time < horizon {
            self.schedule_click();
            scheduled += 1;
            if let Some(on_complete) = self.advance() {
                completed = Some(on_complete);
            }
        }

        (scheduled, completed)
    }

    fn schedule_click(&self) {
        let is_downbeat = self.current_beat == 0;
        let (frequency, amplitude) = self
            .config
            .sound
            .voicing(is_downbeat && self.config.accent);

        self.sink.schedule(ClickEvent {
            time: self.next_click_time,
            beat_index: self.current_beat,
            is_downbeat,
            is_count_in: self.count_in.is_some(),
            frequency,
            amplitude: amplitude * self.config.volume,
            sound: self.config.sound,
        });
    }

    /// Move to the next beat. Returns the count-in callback when the count-in
    /// just completed.
    fn advance(&mut self) -> Option<CountInCallback> {
        self.next_click_time += self.config.beat_duration();
        self.current_beat = (self.current_beat + 1) % self.config.beats_per_bar;

        let count_in = self.count_in.as_mut()?;
        count_in.remaining = count_in.remaining.saturating_sub(1);
        if count_in.remaining > 0 {
            return None;
        }

        let on_complete = self.count_in.take().and_then(|mut c| c.on_complete.take());
        if !self.config.enabled {
            self.stop();
        }
        tracing::debug!("count-in complete");
        on_complete
    }
}

impl std::fmt::Debug for MetronomeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetronomeScheduler")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("next_click_time", &self.next_click_time)
            .field("current_beat", &self.current_beat)
            .field("count_in_remaining", &self.count_in_remaining())
            .finish()
    }
}
