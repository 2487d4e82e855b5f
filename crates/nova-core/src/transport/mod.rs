//! Transport clock provider and audio clock time base.

mod clock;
mod state;

pub use clock::{AudioClock, SystemAudioClock};
pub use state::TransportState;

use std::sync::Arc;

/// Read-only view of the transport, polled once per scheduler tick.
///
/// Implemented by [`TransportState`] and by anything the host application
/// uses to drive playback position.
pub trait TransportSource: Send + Sync {
    /// Current transport position in seconds.
    fn current_time(&self) -> f64;

    /// Whether the transport is rolling.
    fn is_playing(&self) -> bool;
}

impl<T: TransportSource + ?Sized> TransportSource for Arc<T> {
    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }
}
