//! Builder for configuring and constructing an `AudioSession`.

use crate::{AudioSession, Result};
use nova_automation::{RegistryConfig, StoreConfig};
use nova_core::{AudioClock, ClickSink, Error as CoreError, MetronomeConfig};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "bridge")]
use nova_bridge::BridgeConfig;

/// Everything an [`AudioSession`] is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub metronome: MetronomeConfig,
    pub store: StoreConfig,
    pub registry: RegistryConfig,
    /// Bridge server settings. `None` runs without a plugin host bridge.
    #[cfg(feature = "bridge")]
    pub bridge: Option<BridgeConfig>,
    /// Period of the scheduler thread. Overrides `metronome.tick_interval`.
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let metronome = MetronomeConfig::default();
        Self {
            tick_interval: metronome.tick_interval,
            metronome,
            store: StoreConfig::default(),
            registry: RegistryConfig::default(),
            #[cfg(feature = "bridge")]
            bridge: None,
        }
    }
}

impl SessionConfig {
    /// Metronome settings with the session tick interval applied.
    pub fn effective_metronome(&self) -> MetronomeConfig {
        MetronomeConfig {
            tick_interval: self.tick_interval,
            ..self.metronome
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(CoreError::InvalidConfig("tick_interval must be non-zero".into()).into());
        }
        self.effective_metronome().validate()?;
        self.store.validate()?;
        self.registry.validate()?;
        #[cfg(feature = "bridge")]
        if let Some(bridge) = &self.bridge {
            bridge.validate()?;
        }
        Ok(())
    }
}

/// Collaborators default to the system clock and an internal click channel
/// readable through [`AudioSession::clicks`].
///
/// # Example
///
/// ```ignore
/// use nova::prelude::*;
///
/// let session = AudioSession::builder()
///     .bpm(96.0)
///     .time_signature(3, 4)
///     .bridge(BridgeConfig::default())
///     .build()?;
///
/// session.play();
/// ```
pub struct AudioSessionBuilder {
    config: SessionConfig,
    clock: Option<Arc<dyn AudioClock>>,
    click_sink: Option<Box<dyn ClickSink>>,
    click_capacity: usize,
    scheduler_thread: bool,
}

impl Default for AudioSessionBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            clock: None,
            click_sink: None,
            click_capacity: 256,
            scheduler_thread: true,
        }
    }
}

impl AudioSessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metronome(mut self, config: MetronomeConfig) -> Self {
        self.config.metronome = config;
        self
    }

    /// Default: 120
    pub fn bpm(mut self, bpm: f64) -> Self {
        self.config.metronome.bpm = bpm;
        self
    }

    /// Default: 4/4
    pub fn time_signature(mut self, beats_per_bar: u32, beat_unit: u32) -> Self {
        self.config.metronome.beats_per_bar = beats_per_bar;
        self.config.metronome.beat_unit = beat_unit;
        self
    }

    pub fn store(mut self, config: StoreConfig) -> Self {
        self.config.store = config;
        self
    }

    pub fn registry(mut self, config: RegistryConfig) -> Self {
        self.config.registry = config;
        self
    }

    /// Start a bridge server with the session.
    #[cfg(feature = "bridge")]
    pub fn bridge(mut self, config: BridgeConfig) -> Self {
        self.config.bridge = Some(config);
        self
    }

    /// Default: 25 ms
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    /// Audio clock the metronome schedules against.
    pub fn clock(mut self, clock: Arc<dyn AudioClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Send clicks to `sink` instead of the internal channel.
    pub fn click_sink(mut self, sink: impl ClickSink + 'static) -> Self {
        self.click_sink = Some(Box::new(sink));
        self
    }

    /// Capacity of the internal click channel. Default: 256
    pub fn click_capacity(mut self, capacity: usize) -> Self {
        self.click_capacity = capacity;
        self
    }

    /// Whether `build` spawns the scheduler thread. Without it the caller
    /// drives [`AudioSession::tick`]. Default: true
    pub fn scheduler_thread(mut self, enabled: bool) -> Self {
        self.scheduler_thread = enabled;
        self
    }

    pub fn build(self) -> Result<AudioSession> {
        self.config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(nova_core::SystemAudioClock::new()));

        let (sink, clicks) = match self.click_sink {
            Some(sink) => (sink, None),
            None => {
                let (tx, rx) = crossbeam_channel::bounded(self.click_capacity);
                (Box::new(tx) as Box<dyn ClickSink>, Some(rx))
            }
        };

        let session = AudioSession::from_parts(self.config, clock, sink, clicks)?;
        if self.scheduler_thread {
            session.start_scheduler()?;
        }
        Ok(session)
    }
}
