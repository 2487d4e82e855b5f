//! `AudioSession`: owns the automation state, the metronome and the bridge,
//! and drives them from one scheduler thread.

use crate::{AudioSessionBuilder, Error, Result, SessionConfig};
use crossbeam_channel::{Receiver, Sender};
use nova_automation::{
    AutomationEngine, AutomationMode, AutomationStore, ParameterRegistry, ParameterTarget,
};
use nova_core::{
    AudioClock, ClickEvent, ClickSink, MetronomeScheduler, TransportSource, TransportState,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[cfg(feature = "bridge")]
use nova_bridge::{BridgeListener, BridgeSender, BridgeServer, ListenerId};
#[cfg(feature = "bridge")]
use std::net::SocketAddr;

/// Work done by one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Clicks handed to the click sink.
    pub clicks: usize,
    /// Parameters written by automation playback.
    pub applied: usize,
    /// Whether a count-in finished during this pass.
    pub count_in_completed: bool,
}

/// State shared with the scheduler thread.
struct SessionCore {
    store: Arc<AutomationStore>,
    registry: Arc<ParameterRegistry>,
    engine: AutomationEngine,
    metronome: Mutex<MetronomeScheduler>,
    transport: Arc<TransportState>,
    clock: Arc<dyn AudioClock>,
    // Serializes passes; the engine tick is not reentrant.
    tick_lock: Mutex<()>,
}

impl SessionCore {
    fn tick(&self) -> TickReport {
        let _pass = self.tick_lock.lock();
        let now = self.clock.now();

        let (clicks, completed) = self.metronome.lock().tick_deferred(now);
        let count_in_completed = completed.is_some();
        // Outside the metronome lock so the callback may drive the session.
        if let Some(on_complete) = completed {
            on_complete();
        }

        let applied = self.engine.tick();
        TickReport {
            clicks,
            applied,
            count_in_completed,
        }
    }
}

struct SchedulerThread {
    shutdown_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl SchedulerThread {
    fn spawn(core: Arc<SessionCore>, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("nova-scheduler".into())
            .spawn(move || run_scheduler(&core, interval, &shutdown_rx))?;
        Ok(Self {
            shutdown_tx,
            handle,
        })
    }

    fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if self.handle.join().is_err() {
            tracing::error!("scheduler thread panicked");
        }
    }
}

fn run_scheduler(core: &SessionCore, interval: Duration, shutdown_rx: &Receiver<()>) {
    tracing::debug!(?interval, "scheduler thread started");
    let ticker = crossbeam_channel::tick(interval);
    loop {
        crossbeam_channel::select! {
            recv(shutdown_rx) -> _ => break,
            recv(ticker) -> _ => {
                core.tick();
            }
        }
    }
    tracing::debug!("scheduler thread exiting");
}

/// Session context for the synchronization layer.
///
/// Owns the automation store, parameter registry and engine, the metronome,
/// the transport, and optionally a bridge server. Every component is reached
/// through the session; there is no global state.
///
/// # Example
///
/// ```ignore
/// use nova::prelude::*;
/// use std::sync::Arc;
///
/// let session = AudioSession::builder().build()?;
///
/// let gain = Arc::new(AtomicFloat::new(1.0));
/// session.register_parameter("track1.gain", "track1", gain.clone(), 1.0);
///
/// session.engine().set_mode(AutomationMode::Write);
/// session.engine().touch("track1.gain");
/// session.play();
/// ```
pub struct AudioSession {
    core: Arc<SessionCore>,
    config: SessionConfig,
    clicks: Option<Receiver<ClickEvent>>,
    scheduler: Mutex<Option<SchedulerThread>>,
    #[cfg(feature = "bridge")]
    bridge: Mutex<Option<BridgeServer>>,
}

impl AudioSession {
    pub fn builder() -> AudioSessionBuilder {
        AudioSessionBuilder::default()
    }

    pub(crate) fn from_parts(
        config: SessionConfig,
        clock: Arc<dyn AudioClock>,
        sink: Box<dyn ClickSink>,
        clicks: Option<Receiver<ClickEvent>>,
    ) -> Result<Self> {
        let store = Arc::new(AutomationStore::with_config(config.store)?);
        let registry = Arc::new(ParameterRegistry::with_config(config.registry)?);
        let transport = Arc::new(TransportState::new());
        let engine = AutomationEngine::new(Arc::clone(&store), Arc::clone(&registry))
            .with_transport(Arc::clone(&transport) as Arc<dyn TransportSource>);
        let metronome = MetronomeScheduler::new(config.effective_metronome(), sink)?;

        #[cfg(feature = "bridge")]
        let bridge = match &config.bridge {
            Some(bridge_config) => {
                let mut server = BridgeServer::new(bridge_config.clone())?;
                let addr = server.start()?;
                tracing::info!(%addr, "session bridge listening");
                Some(server)
            }
            None => None,
        };

        Ok(Self {
            core: Arc::new(SessionCore {
                store,
                registry,
                engine,
                metronome: Mutex::new(metronome),
                transport,
                clock,
                tick_lock: Mutex::new(()),
            }),
            config,
            clicks,
            scheduler: Mutex::new(None),
            #[cfg(feature = "bridge")]
            bridge: Mutex::new(bridge),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<AutomationStore> {
        &self.core.store
    }

    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.core.registry
    }

    pub fn engine(&self) -> &AutomationEngine {
        &self.core.engine
    }

    pub fn transport(&self) -> &Arc<TransportState> {
        &self.core.transport
    }

    pub fn clock(&self) -> &Arc<dyn AudioClock> {
        &self.core.clock
    }

    /// Scheduled clicks, when the session owns the click channel.
    pub fn clicks(&self) -> Option<&Receiver<ClickEvent>> {
        self.clicks.as_ref()
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Register a parameter living in this process.
    pub fn register_parameter(
        &self,
        id: impl Into<String>,
        target_id: impl Into<String>,
        target: Arc<dyn ParameterTarget>,
        default_value: f32,
    ) {
        self.core
            .registry
            .register(id, target_id, target, default_value, false);
    }

    /// Register a plugin parameter hosted across the bridge. Deliveries are
    /// throttled by the registry.
    #[cfg(feature = "bridge")]
    pub fn register_bridged(
        &self,
        id: impl Into<String>,
        slot_id: impl Into<String>,
        name: impl Into<String>,
        default_value: f32,
    ) -> Result<()> {
        let sender = self.bridge_sender().ok_or(Error::BridgeUnavailable)?;
        let slot_id = slot_id.into();
        let target = crate::BridgedParameter::new(sender, slot_id.clone(), name);
        self.core
            .registry
            .register(id, slot_id, Arc::new(target), default_value, true);
        Ok(())
    }

    pub fn unregister_parameter(&self, id: &str) -> bool {
        self.core.registry.unregister(id).is_some()
    }

    // =========================================================================
    // Transport
    // =========================================================================

    pub fn play(&self) {
        self.core.transport.play();
    }

    /// Stop the transport, the metronome and automation (mode back to `Off`).
    pub fn stop(&self) {
        self.core.transport.stop();
        self.core.metronome.lock().stop();
        self.core.engine.stop();
    }

    pub fn seek(&self, seconds: f64) {
        self.core.transport.seek(seconds);
    }

    pub fn set_automation_mode(&self, mode: AutomationMode) {
        self.core.engine.set_mode(mode);
    }

    // =========================================================================
    // Metronome
    // =========================================================================

    /// Run `f` with exclusive access to the metronome.
    ///
    /// Do not call [`tick`](Self::tick) from inside `f`.
    pub fn metronome<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut MetronomeScheduler) -> R,
    {
        f(&mut self.core.metronome.lock())
    }

    /// Start clicking from the downbeat at the current audio clock time.
    pub fn start_metronome(&self) {
        let now = self.core.clock.now();
        self.core.metronome.lock().start(now);
    }

    /// Count in `bars` bars from now. `on_complete` runs on the scheduler
    /// thread, outside the metronome lock.
    pub fn start_count_in(
        &self,
        bars: u32,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        let now = self.core.clock.now();
        self.core
            .metronome
            .lock()
            .start_count_in(now, bars, on_complete)?;
        Ok(())
    }

    pub fn stop_metronome(&self) {
        self.core.metronome.lock().stop();
    }

    /// Realign the metronome's beat phase to the transport position.
    pub fn sync_metronome(&self) {
        let transport_time = self.core.transport.current_time();
        let now = self.core.clock.now();
        self.core
            .metronome
            .lock()
            .sync_to_time(transport_time, now);
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<()> {
        self.core.metronome.lock().set_bpm(bpm)?;
        Ok(())
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Run one scheduler pass: metronome look-ahead, then automation playback.
    pub fn tick(&self) -> TickReport {
        self.core.tick()
    }

    /// Spawn the scheduler thread. No-op if it is already running.
    pub fn start_scheduler(&self) -> Result<()> {
        let mut scheduler = self.scheduler.lock();
        if scheduler.is_none() {
            *scheduler = Some(SchedulerThread::spawn(
                Arc::clone(&self.core),
                self.config.tick_interval,
            )?);
        }
        Ok(())
    }

    /// Stop and join the scheduler thread.
    pub fn stop_scheduler(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.stop();
        }
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    // =========================================================================
    // Bridge
    // =========================================================================

    #[cfg(feature = "bridge")]
    pub fn bridge_addr(&self) -> Option<SocketAddr> {
        self.bridge.lock().as_ref().and_then(BridgeServer::local_addr)
    }

    /// Handle for sending to bridge clients, if the bridge is running.
    #[cfg(feature = "bridge")]
    pub fn bridge_sender(&self) -> Option<BridgeSender> {
        self.bridge
            .lock()
            .as_ref()
            .filter(|server| server.is_running())
            .map(BridgeServer::sender)
    }

    #[cfg(feature = "bridge")]
    pub fn add_bridge_listener(&self, listener: Arc<dyn BridgeListener>) -> Result<ListenerId> {
        self.bridge
            .lock()
            .as_ref()
            .map(|server| server.add_listener(listener))
            .ok_or(Error::BridgeUnavailable)
    }

    #[cfg(feature = "bridge")]
    pub fn remove_bridge_listener(&self, id: ListenerId) -> bool {
        self.bridge
            .lock()
            .as_ref()
            .is_some_and(|server| server.remove_listener(id))
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stop the scheduler thread and the bridge server.
    ///
    /// Bridge join timeouts are surfaced; the session is shut down either way.
    pub fn shutdown(&self) -> Result<()> {
        self.stop_scheduler();
        self.core.metronome.lock().stop();

        #[cfg(feature = "bridge")]
        {
            let server = self.bridge.lock().take();
            if let Some(mut server) = server {
                server.stop()?;
            }
        }
        Ok(())
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "session shutdown failed");
        }
    }
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession")
            .field("config", &self.config)
            .field("mode", &self.core.engine.mode())
            .field("parameters", &self.core.registry.len())
            .field("scheduler_running", &self.is_scheduler_running())
            .finish()
    }
}
