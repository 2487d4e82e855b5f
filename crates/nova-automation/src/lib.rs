//! Parameter automation for Nova.
//!
//! - [`CurveType`]: segment interpolation laws
//! - [`AutomationStore`]: per-parameter lanes with coalescing, thinning and snapshots
//! - [`ParameterRegistry`]: parameter id to [`ParameterTarget`], with bridged throttling
//! - [`AutomationEngine`]: WRITE/TOUCH/LATCH recording and READ playback
//!
//! # Example
//!
//! ```ignore
//! use nova_automation::{AutomationEngine, AutomationMode, AutomationStore, ParameterRegistry};
//! use nova_core::AtomicFloat;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ParameterRegistry::new());
//! let gain = Arc::new(AtomicFloat::new(1.0));
//! registry.register("track1.gain", "track1", gain.clone(), 1.0, false);
//!
//! let engine = AutomationEngine::new(Arc::new(AutomationStore::new()), registry);
//! engine.set_mode(AutomationMode::Touch);
//! engine.touch("track1.gain");
//! engine.set_value("track1.gain", 0.5, 2.0); // applied and recorded at 2.0 s
//! engine.release("track1.gain");
//! ```

pub mod curve;
pub use curve::CurveType;

pub mod store;
pub use store::{AutomationData, AutomationPoint, AutomationSnapshot, AutomationStore, StoreConfig};

pub mod registry;
pub use registry::{ParameterRegistry, ParameterTarget, RegisteredParameter, RegistryConfig};

pub mod engine;
pub use engine::{AutomationEngine, AutomationMode};

pub mod notify;
pub use notify::{ValueNotifier, ValueSubscription};
