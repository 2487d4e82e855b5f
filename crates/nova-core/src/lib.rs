//! Timing core for the Nova synchronization layer.
//!
//! # Primary API
//!
//! - [`MetronomeScheduler`]: look-ahead click and count-in scheduler
//! - [`TransportSource`] / [`TransportState`]: shared transport clock provider
//! - [`AudioClock`] / [`SystemAudioClock`]: audio clock time base
//! - [`AtomicFloat`], [`AtomicDouble`], [`AtomicFlag`]: lock-free cells
//!
//! # Example
//!
//! ```ignore
//! use nova_core::{MetronomeConfig, MetronomeScheduler};
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let mut metronome = MetronomeScheduler::new(MetronomeConfig::default(), tx)?;
//!
//! metronome.start(0.0);
//! metronome.tick(0.0); // schedules every click inside the look-ahead window
//!
//! let click = rx.try_recv()?;
//! assert!(click.is_downbeat);
//! ```

pub mod error;
pub use error::{Error, Result};

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat};

pub mod transport;
pub use transport::{AudioClock, SystemAudioClock, TransportSource, TransportState};

pub mod metronome;
pub use metronome::{
    ClickEvent, ClickSink, ClickSound, CountInCallback, MetronomeConfig, MetronomeScheduler,
    SchedulerState,
};
