//! Metronome configuration.

use super::ClickSound;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metronome configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetronomeConfig {
    pub bpm: f64,
    /// Time signature numerator.
    pub beats_per_bar: u32,
    /// Time signature denominator.
    pub beat_unit: u32,
    pub sound: ClickSound,
    /// Distinct voicing for beat 0 of each bar.
    pub accent: bool,
    pub volume: f32,
    /// Whether clicks continue after a count-in finishes.
    pub enabled: bool,
    /// Look-ahead window in seconds.
    pub schedule_ahead: f64,
    /// Poll interval of the thread driving [`tick`](super::MetronomeScheduler::tick).
    pub tick_interval: Duration,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
            beat_unit: 4,
            sound: ClickSound::Tone,
            accent: true,
            volume: 0.5,
            enabled: true,
            schedule_ahead: 0.1,
            tick_interval: Duration::from_millis(25),
        }
    }
}

impl MetronomeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(20.0..=999.0).contains(&self.bpm) {
            return Err(Error::InvalidTempo(self.bpm));
        }
        if self.beats_per_bar == 0 || !self.beat_unit.is_power_of_two() {
            return Err(Error::InvalidTimeSignature {
                numerator: self.beats_per_bar,
                denominator: self.beat_unit,
            });
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(Error::InvalidConfig(format!(
                "volume {} out of range (0.0-1.0)",
                self.volume
            )));
        }
        // The drain loop needs a window wider than one poll interval.
        if self.schedule_ahead <= self.tick_interval.as_secs_f64() {
            return Err(Error::InvalidConfig(format!(
                "schedule_ahead {}s must exceed tick_interval {:?}",
                self.schedule_ahead, self.tick_interval
            )));
        }
        Ok(())
    }

    /// Seconds per beat.
    #[inline]
    pub fn beat_duration(&self) -> f64 {
        60.0 / self.bpm
    }
}
