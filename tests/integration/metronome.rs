//! Metronome integration tests
//!
//! Drives the session's scheduler pass on a manual clock and checks the
//! clicks that reach the click channel.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use approx::assert_relative_eq;
use nova::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_four_beats_at_120_bpm() {
    let (session, clock) = test_session();
    session.start_metronome();

    session.tick();
    drive(&session, &clock, 0.5, 3);

    let clicks = drain_clicks(&session);
    assert_eq!(clicks.len(), 4);
    for (i, click) in clicks.iter().enumerate() {
        assert_relative_eq!(click.time, i as f64 * 0.5, epsilon = TIME_EPSILON);
        assert_eq!(click.beat_index, i as u32);
        assert!(!click.is_count_in);
    }

    let (beat, next) = session.metronome(|m| (m.current_beat(), m.next_click_time()));
    assert_eq!(beat, 0);
    assert_relative_eq!(next, 2.0, epsilon = TIME_EPSILON);
}

#[test]
fn test_downbeat_is_accented() {
    let (session, clock) = test_session();
    session.start_metronome();
    session.tick();
    drive(&session, &clock, 0.5, 1);

    let clicks = drain_clicks(&session);
    assert!(clicks[0].is_downbeat);
    assert!(!clicks[1].is_downbeat);
    assert_ne!(clicks[0].frequency, clicks[1].frequency);
}

#[test]
fn test_three_four_bar() {
    let (session, clock) = test_session_with(AudioSession::builder().time_signature(3, 4));
    session.start_metronome();
    session.tick();
    drive(&session, &clock, 0.5, 5);

    let downbeats: Vec<bool> = drain_clicks(&session).iter().map(|c| c.is_downbeat).collect();
    assert_eq!(downbeats, [true, false, false, true, false, false]);
}

#[test]
fn test_look_ahead_schedules_early() {
    let (session, clock) = test_session();
    session.start_metronome();
    session.tick();
    drain_clicks(&session);

    // 0.45 s: the 0.5 s click is inside the 100 ms window
    clock.set(0.45);
    assert_eq!(session.tick().clicks, 1);
    // Already scheduled clicks are not repeated
    assert_eq!(session.tick().clicks, 0);
}

#[test]
fn test_count_in_then_roll() {
    let (session, clock) = test_session();
    let transport = session.transport().clone();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    session
        .start_count_in(1, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            transport.play();
        })
        .unwrap();

    let mut reports = vec![session.tick()];
    reports.extend(drive(&session, &clock, 0.5, 5));

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(reports.iter().filter(|r| r.count_in_completed).count(), 1);
    assert!(reports[3].count_in_completed);
    assert!(session.transport().is_playing());

    let clicks = drain_clicks(&session);
    assert_eq!(clicks.len(), 6);
    assert!(clicks[..4].iter().all(|c| c.is_count_in));
    assert!(!clicks[4].is_count_in);
    assert!(clicks[4].is_downbeat);
}

#[test]
fn test_disabled_metronome_stops_after_count_in() {
    let (session, clock) = test_session();
    session.metronome(|m| m.set_enabled(false));
    session.start_count_in(1, || {}).unwrap();

    session.tick();
    drive(&session, &clock, 0.5, 7);

    assert_eq!(drain_clicks(&session).len(), 4);
    assert!(!session.metronome(|m| m.is_running()));
}

#[test]
fn test_zero_bar_count_in_is_rejected() {
    let (session, _clock) = test_session();
    assert!(session.start_count_in(0, || {}).is_err());
    assert!(!session.metronome(|m| m.is_running()));
}

#[test]
fn test_sync_to_transport_position() {
    let (session, clock) = test_session();
    session.start_metronome();

    // 0.75 s is 1.5 beats: the next click is beat 2, a quarter second away
    session.seek(0.75);
    clock.set(10.0);
    session.sync_metronome();

    let (beat, next) = session.metronome(|m| (m.current_beat(), m.next_click_time()));
    assert_eq!(beat, 2);
    assert_relative_eq!(next, 10.25, epsilon = TIME_EPSILON);

    clock.set(10.2);
    session.tick();
    let clicks = drain_clicks(&session);
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].beat_index, 2);
    assert!(!clicks[0].is_downbeat);
}

#[test]
fn test_tempo_change() {
    let (session, clock) = test_session();
    session.set_bpm(60.0).unwrap();
    assert!(matches!(
        session.set_bpm(5.0),
        Err(nova::Error::Core(nova::core::Error::InvalidTempo(_)))
    ));

    session.start_metronome();
    session.tick();
    drive(&session, &clock, 0.5, 2);

    let times: Vec<f64> = drain_clicks(&session).iter().map(|c| c.time).collect();
    assert_eq!(times, [0.0, 1.0]);
}

#[test]
fn test_stop_is_synchronous() {
    let (session, clock) = test_session();
    session.start_metronome();
    session.tick();

    session.stop_metronome();
    drive(&session, &clock, 0.5, 4);
    assert_eq!(drain_clicks(&session).len(), 1);
}
