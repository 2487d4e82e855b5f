//! # Nova - Real-time Synchronization Core
//!
//! Keeps three independently clocked subsystems coherent behind one session.
//!
//! ## Architecture
//!
//! Nova is an umbrella crate that coordinates:
//! - **nova-core** - Transport clock, lock-free atomics, look-ahead metronome
//! - **nova-automation** - Curves, automation lanes, parameter registry, record/playback engine
//! - **nova-bridge** - Framed socket bridge to the out-of-process plugin host
//!
//! ## Quick Start
//!
//! ```ignore
//! use nova::prelude::*;
//! use std::sync::Arc;
//!
//! let session = AudioSession::builder()
//!     .bpm(120.0)
//!     .bridge(BridgeConfig::default())
//!     .build()?;
//!
//! // Local parameter backed by an atomic the audio graph reads
//! let gain = Arc::new(AtomicFloat::new(1.0));
//! session.register_parameter("track1.gain", "track1", gain, 1.0);
//!
//! // Plugin parameter in the native host, throttled to one update per 30 ms
//! session.register_bridged("synth.cutoff", "synth", "cutoff", 0.5)?;
//!
//! // Count in one bar, then roll
//! let transport = session.transport().clone();
//! session.start_count_in(1, move || transport.play())?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything enabled
//! - `bridge` - Native plugin host bridge server

/// Re-export of nova-core for direct access
pub use nova_core as core;

/// Re-export of nova-automation for direct access
pub use nova_automation as automation;

// Core types
pub use nova_core::{
    AtomicDouble, AtomicFlag, AtomicFloat, AudioClock, ClickEvent, ClickSink, ClickSound,
    MetronomeConfig, MetronomeScheduler, SystemAudioClock, TransportSource, TransportState,
};

// Automation
pub use nova_automation::{
    AutomationData, AutomationEngine, AutomationMode, AutomationPoint, AutomationSnapshot,
    AutomationStore, CurveType, ParameterRegistry, ParameterTarget, RegistryConfig, StoreConfig,
    ValueSubscription,
};

// Plugin host bridge
#[cfg(feature = "bridge")]
pub use nova_bridge as bridge;

#[cfg(feature = "bridge")]
pub use nova_bridge::{BridgeConfig, BridgeEvent, BridgeListener, BridgeSender, ParameterUpdate};

mod error;
pub use error::{Error, Result};

mod builder;
mod session;

#[cfg(feature = "bridge")]
mod bridged;

pub use builder::{AudioSessionBuilder, SessionConfig};
pub use session::{AudioSession, TickReport};

#[cfg(feature = "bridge")]
pub use bridged::BridgedParameter;

/// Convenience prelude for common imports
pub mod prelude {
    // Session
    pub use crate::{AudioSession, AudioSessionBuilder, SessionConfig};

    // Automation
    pub use crate::{AutomationMode, CurveType, ParameterTarget};

    // Lock-free cells for local parameters
    pub use crate::AtomicFloat;

    // Transport
    pub use crate::{TransportSource, TransportState};

    // Bridge
    #[cfg(feature = "bridge")]
    pub use crate::{BridgeConfig, BridgeEvent};
}
