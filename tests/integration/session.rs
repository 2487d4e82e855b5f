//! Session integration tests
//!
//! Builder validation, the real scheduler thread, and teardown.

use crate::helpers::*;
use nova::prelude::*;
use nova::{MetronomeConfig, StoreConfig};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_builder_defaults() {
    let (session, _clock) = test_session();
    let config = session.config();
    assert_eq!(config.metronome.bpm, 120.0);
    assert_eq!(config.tick_interval, Duration::from_millis(25));
    assert_eq!(config.store.coalesce_window, 0.05);
    assert!(!session.is_scheduler_running());
    assert!(session.clicks().is_some());
}

#[test]
fn test_builder_rejects_invalid_parts() {
    let bad_store = AudioSession::builder()
        .store(StoreConfig {
            coalesce_window: -1.0,
            ..Default::default()
        })
        .scheduler_thread(false)
        .build();
    assert!(bad_store.is_err());

    let bad_metronome = AudioSession::builder()
        .metronome(MetronomeConfig {
            beats_per_bar: 0,
            ..Default::default()
        })
        .scheduler_thread(false)
        .build();
    assert!(bad_metronome.is_err());
}

#[test]
fn test_scheduler_thread_plays_automation() {
    let session = AudioSession::builder()
        .tick_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    let gain = Arc::new(AtomicFloat::new(0.0));
    session.register_parameter("master.gain", "master", gain.clone(), 0.0);
    session
        .store()
        .add_point("master.gain", 0.0, 0.8, CurveType::Linear);

    session.set_automation_mode(AutomationMode::Read);
    session.play();
    assert!(wait_until(1000, || gain.get() == 0.8));
}

#[test]
fn test_scheduler_thread_clicks_in_order() {
    let session = AudioSession::builder()
        .tick_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    session.start_metronome();

    let clicks = session.clicks().unwrap();
    let first = clicks.recv_timeout(Duration::from_secs(1)).unwrap();
    let second = clicks.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(first.beat_index, 0);
    assert_eq!(second.beat_index, 1);
    assert!((second.time - first.time - 0.5).abs() < 1e-9);
}

#[test]
fn test_restart_scheduler() {
    let session = AudioSession::builder()
        .tick_interval(Duration::from_millis(5))
        .build()
        .unwrap();
    session.stop_scheduler();
    assert!(!session.is_scheduler_running());

    session.start_scheduler().unwrap();
    assert!(session.is_scheduler_running());
    session.start_metronome();
    assert!(session
        .clicks()
        .unwrap()
        .recv_timeout(Duration::from_secs(1))
        .is_ok());
}

#[test]
fn test_shutdown_is_idempotent() {
    let session = AudioSession::builder().build().unwrap();
    session.shutdown().unwrap();
    assert!(!session.is_scheduler_running());
    session.shutdown().unwrap();
}

#[test]
fn test_session_is_shareable() {
    let (session, _clock) = test_session();
    let session = Arc::new(session);
    let gain = Arc::new(AtomicFloat::new(0.0));
    session.register_parameter("gain", "track1", gain.clone(), 0.0);
    session.set_automation_mode(AutomationMode::Write);
    session.engine().touch("gain");

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let session = Arc::clone(&session);
            std::thread::spawn(move || {
                for j in 0..25 {
                    let time = (i * 25 + j) as f64;
                    session.engine().set_value("gain", 0.5, time);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let points = session.store().points("gain");
    assert_eq!(points.len(), 100);
    assert!(points.windows(2).all(|w| w[0].time <= w[1].time));
}
