//! Automation record/playback engine.

use crate::notify::{ValueNotifier, ValueSubscription};
use crate::store::{AutomationData, AutomationSnapshot, AutomationStore};
use crate::registry::ParameterRegistry;
use nova_core::TransportSource;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Session-wide automation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AutomationMode {
    /// No reads or writes.
    #[default]
    Off = 0,
    /// Play lanes back into untouched parameters.
    Read = 1,
    /// Record every change to touched parameters.
    Write = 2,
    /// Record while a control is held.
    Touch = 3,
    /// Record from touch until the caller releases.
    Latch = 4,
}

impl From<u8> for AutomationMode {
    fn from(value: u8) -> Self {
        match value {
            1 => AutomationMode::Read,
            2 => AutomationMode::Write,
            3 => AutomationMode::Touch,
            4 => AutomationMode::Latch,
            _ => AutomationMode::Off,
        }
    }
}

impl AutomationMode {
    /// Whether `set_value` on a touched parameter persists a point.
    pub fn can_record(&self) -> bool {
        matches!(
            self,
            AutomationMode::Write | AutomationMode::Touch | AutomationMode::Latch
        )
    }
}

/// Automation engine.
///
/// The only mutator of the store: user gestures arrive through
/// [`set_value`](Self::set_value)/[`touch`](Self::touch)/[`release`](Self::release),
/// playback through [`tick`](Self::tick). `tick` must not run on two threads
/// at once; everything else may be called from any thread.
pub struct AutomationEngine {
    store: Arc<AutomationStore>,
    registry: Arc<ParameterRegistry>,
    notifier: ValueNotifier,
    mode: AtomicU8,
    recording: RwLock<HashSet<String>>,
    transport: Option<Arc<dyn TransportSource>>,
}

impl AutomationEngine {
    pub fn new(store: Arc<AutomationStore>, registry: Arc<ParameterRegistry>) -> Self {
        Self {
            store,
            registry,
            notifier: ValueNotifier::new(),
            mode: AtomicU8::new(AutomationMode::Off as u8),
            recording: RwLock::new(HashSet::new()),
            transport: None,
        }
    }

    /// Attach the transport clock polled by [`tick`](Self::tick).
    pub fn with_transport(mut self, transport: Arc<dyn TransportSource>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(&self) -> &Arc<AutomationStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.registry
    }

    // =========================================================================
    // Mode
    // =========================================================================

    pub fn mode(&self) -> AutomationMode {
        AutomationMode::from(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: AutomationMode) {
        let previous = AutomationMode::from(self.mode.swap(mode as u8, Ordering::AcqRel));
        if previous != mode {
            tracing::debug!(?previous, ?mode, "automation mode changed");
        }
    }

    /// Reset to `Off`, release every touched parameter and forget
    /// notification slots nobody listens to anymore.
    pub fn stop(&self) {
        self.set_mode(AutomationMode::Off);
        self.recording.write().clear();
        self.notifier.prune();
    }

    // =========================================================================
    // Gestures
    // =========================================================================

    /// Apply `value` now and, when `id` is touched in a recording mode, record
    /// it at transport time `time`. Returns `false` for unknown ids.
    pub fn set_value(&self, id: &str, value: f32, time: f64) -> bool {
        if !self.registry.contains(id) {
            return false;
        }
        self.registry.apply(id, value);

        if self.mode().can_record() && self.is_touched(id) {
            let curve = self.store.config().default_curve;
            self.store.add_point(id, time, value, curve);
        }
        true
    }

    /// Mark `id` as held by the user. Suppresses playback for it.
    pub fn touch(&self, id: &str) -> bool {
        if !self.registry.contains(id) {
            return false;
        }
        self.recording.write().insert(id.to_owned());
        true
    }

    pub fn release(&self, id: &str) -> bool {
        self.recording.write().remove(id)
    }

    pub fn is_touched(&self, id: &str) -> bool {
        self.recording.read().contains(id)
    }

    pub fn touched(&self) -> Vec<String> {
        self.recording.read().iter().cloned().collect()
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Run one playback pass at the transport's current position. Without a
    /// transport the time is zero and nothing is played.
    ///
    /// Returns the number of parameters written.
    pub fn tick(&self) -> usize {
        match &self.transport {
            Some(transport) => self.tick_at(transport.current_time(), transport.is_playing()),
            None => self.tick_at(0.0, false),
        }
    }

    /// Run one playback pass at `time`.
    pub fn tick_at(&self, time: f64, playing: bool) -> usize {
        if !playing || self.mode() != AutomationMode::Read {
            return 0;
        }

        let touched = self.recording.read().clone();
        let mut applied = 0;
        for id in self.registry.ids() {
            if touched.contains(&id) {
                continue;
            }
            let Some(value) = self.store.interpolate_at(&id, time) else {
                continue;
            };
            if self.registry.apply(&id, value) {
                applied += 1;
            }
            self.notifier.notify(&id, value);
        }
        applied
    }

    /// Receive values written by playback for `id`.
    pub fn subscribe(&self, id: &str) -> ValueSubscription {
        self.notifier.prune();
        self.notifier.subscribe(id)
    }

    // =========================================================================
    // Lane access
    // =========================================================================

    pub fn value_at(&self, id: &str, time: f64) -> Option<f32> {
        self.store.interpolate_at(id, time)
    }

    pub fn load_automation(&self, data: AutomationData) {
        self.store.load(data);
    }

    pub fn export_automation(&self) -> AutomationData {
        self.store.export()
    }

    pub fn clear_automation(&self, id: &str) {
        self.store.clear(id);
    }

    /// Returns the number of points removed.
    pub fn thin_automation(&self, id: &str, threshold: f32) -> usize {
        self.store.thin(id, threshold)
    }

    /// Current value of every lane and registered parameter.
    pub fn snapshot(&self) -> AutomationSnapshot {
        self.store.snapshot(&self.registry.defaults())
    }

    pub fn apply_snapshot(&self, snapshot: &AutomationSnapshot, time: f64) {
        self.store.apply_snapshot(snapshot, time);
    }
}

impl std::fmt::Debug for AutomationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationEngine")
            .field("mode", &self.mode())
            .field("touched", &self.recording.read().len())
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}
