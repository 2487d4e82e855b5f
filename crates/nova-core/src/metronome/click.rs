//! Click events, click sinks, and the three click generators.

use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Click sound generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickSound {
    /// Sine tone with a short attack/sustain/release envelope.
    #[default]
    Tone,
    /// Band-passed noise burst.
    Woodblock,
    /// Square wave.
    Beep,
}

impl ClickSound {
    /// Frequency and relative amplitude for a normal or accented click.
    pub fn voicing(&self, accent: bool) -> (f32, f32) {
        let amplitude = if accent { 1.0 } else { 0.7 };
        let frequency = match (self, accent) {
            (ClickSound::Tone, false) => 1000.0,
            (ClickSound::Tone, true) => 1200.0,
            (ClickSound::Woodblock, false) => 800.0,
            (ClickSound::Woodblock, true) => 1200.0,
            (ClickSound::Beep, false) => 880.0,
            (ClickSound::Beep, true) => 1760.0,
        };
        (frequency, amplitude)
    }

    /// Length of the rendered click in seconds.
    pub fn duration(&self) -> f64 {
        match self {
            ClickSound::Tone => 0.03,
            ClickSound::Woodblock => 0.04,
            ClickSound::Beep => 0.05,
        }
    }

    /// Render a mono click buffer for sinks that mix samples themselves.
    pub fn render(&self, frequency: f32, amplitude: f32, sample_rate: f64) -> Vec<f32> {
        let num_samples = (sample_rate * self.duration()) as usize;
        let amplitude = amplitude.clamp(0.0, 1.0) as f64;
        let frequency = frequency as f64;

        match self {
            ClickSound::Tone => render_tone(num_samples, frequency, amplitude, sample_rate),
            ClickSound::Woodblock => {
                render_woodblock(num_samples, frequency, amplitude, sample_rate)
            }
            ClickSound::Beep => render_beep(num_samples, frequency, amplitude, sample_rate),
        }
    }
}

fn render_tone(num_samples: usize, freq: f64, amplitude: f64, sample_rate: f64) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let env = if t < 0.001 {
                t / 0.001
            } else if t < 0.02 {
                1.0
            } else {
                (1.0 - (t - 0.02) / 0.01).max(0.0)
            };
            let phase = 2.0 * PI * freq * t;
            (phase.sin() * env * amplitude) as f32
        })
        .collect()
}

fn render_woodblock(num_samples: usize, freq: f64, amplitude: f64, sample_rate: f64) -> Vec<f32> {
    // RBJ band-pass, constant 0 dB peak gain
    let q = 6.0;
    let w0 = 2.0 * PI * (freq / sample_rate).min(0.49);
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    let (b0, b2) = (alpha / a0, -alpha / a0);
    let (a1, a2) = (-2.0 * w0.cos() / a0, (1.0 - alpha) / a0);

    let mut rng_state: u32 = 0x9E37_79B9;
    let (mut x1, mut x2, mut y1, mut y2) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);

    let mut out: Vec<f64> = (0..num_samples)
        .map(|i| {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 17;
            rng_state ^= rng_state << 5;
            let noise = (rng_state as f64 / u32::MAX as f64) * 2.0 - 1.0;

            let t = i as f64 / sample_rate;
            let x = noise * (-t / 0.008).exp();
            let y = b0 * x + b2 * x2 - a1 * y1 - a2 * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = y;
            y
        })
        .collect();

    let peak = out.iter().fold(0.0f64, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        let gain = amplitude / peak;
        out.iter_mut().for_each(|s| *s *= gain);
    }
    out.into_iter().map(|s| s as f32).collect()
}

fn render_beep(num_samples: usize, freq: f64, amplitude: f64, sample_rate: f64) -> Vec<f32> {
    let release_start = num_samples.saturating_sub((sample_rate * 0.005) as usize);
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let env = if t < 0.002 {
                t / 0.002
            } else if i >= release_start {
                (num_samples - i) as f64 / (num_samples - release_start).max(1) as f64
            } else {
                1.0
            };
            let square = if (freq * t).fract() < 0.5 { 1.0 } else { -1.0 };
            (square * env * amplitude) as f32
        })
        .collect()
}

/// One scheduled click, stamped in the audio clock's time base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    /// Start time in audio clock seconds.
    pub time: f64,
    /// Beat index within the bar (0 = downbeat).
    pub beat_index: u32,
    pub is_downbeat: bool,
    pub is_count_in: bool,
    pub frequency: f32,
    pub amplitude: f32,
    pub sound: ClickSound,
}

/// Audio callback sink receiving precisely timed click events.
pub trait ClickSink: Send {
    fn schedule(&self, event: ClickEvent);
}

impl ClickSink for Sender<ClickEvent> {
    fn schedule(&self, event: ClickEvent) {
        match self.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(time = event.time, "click sink full, dropping click");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(time = event.time, "click sink disconnected");
            }
        }
    }
}

impl<S: ClickSink + Sync> ClickSink for std::sync::Arc<S> {
    fn schedule(&self, event: ClickEvent) {
        (**self).schedule(event)
    }
}

impl<S: ClickSink + ?Sized> ClickSink for Box<S> {
    fn schedule(&self, event: ClickEvent) {
        (**self).schedule(event)
    }
}
