//! Automation integration tests
//!
//! Records gestures through the session's engine and plays them back against
//! the transport.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use approx::assert_relative_eq;
use nova::prelude::*;
use nova::AutomationData;
use std::sync::Arc;

fn session_with_gain() -> (AudioSession, Arc<AtomicFloat>) {
    let (session, _clock) = test_session();
    let gain = Arc::new(AtomicFloat::new(1.0));
    session.register_parameter("track1.gain", "track1", gain.clone(), 1.0);
    (session, gain)
}

// ---------------------------------------------------------------------------
// Recording
// ---------------------------------------------------------------------------

#[test]
fn test_write_then_read_back() {
    let (session, gain) = session_with_gain();
    let engine = session.engine();

    session.set_automation_mode(AutomationMode::Write);
    assert!(engine.touch("track1.gain"));
    engine.set_value("track1.gain", 0.0, 0.0);
    engine.set_value("track1.gain", 1.0, 1.0);
    engine.release("track1.gain");
    assert_eq!(session.store().len("track1.gain"), 2);

    session.set_automation_mode(AutomationMode::Read);
    session.seek(0.5);
    session.play();
    let report = session.tick();

    assert_eq!(report.applied, 1);
    assert_relative_eq!(gain.get(), 0.5, epsilon = CURVE_EPSILON);
}

#[test]
fn test_untouched_gesture_is_applied_not_recorded() {
    let (session, gain) = session_with_gain();
    session.set_automation_mode(AutomationMode::Write);

    assert!(session.engine().set_value("track1.gain", 0.3, 2.0));
    assert_eq!(gain.get(), 0.3);
    assert!(session.store().is_empty("track1.gain"));
}

#[test]
fn test_read_and_off_modes_never_record() {
    let (session, _gain) = session_with_gain();
    session.engine().touch("track1.gain");

    for mode in [AutomationMode::Off, AutomationMode::Read] {
        session.set_automation_mode(mode);
        session.engine().set_value("track1.gain", 0.4, 1.0);
    }
    assert!(session.store().is_empty("track1.gain"));
}

#[test]
fn test_unknown_parameter_is_ignored() {
    let (session, _gain) = session_with_gain();
    session.set_automation_mode(AutomationMode::Write);

    assert!(!session.engine().touch("missing"));
    assert!(!session.engine().set_value("missing", 0.5, 0.0));
    assert!(session.store().lane_ids().is_empty());
}

#[test]
fn test_gesture_coalescing() {
    let (session, _gain) = session_with_gain();
    let engine = session.engine();
    session.set_automation_mode(AutomationMode::Touch);
    engine.touch("track1.gain");

    engine.set_value("track1.gain", 0.1, 1.00);
    engine.set_value("track1.gain", 0.2, 1.04);
    let points = session.store().points("track1.gain");
    assert_eq!(points.len(), 1);
    assert_relative_eq!(points[0].time, 1.04, epsilon = TIME_EPSILON);
    assert_relative_eq!(points[0].value, 0.2, epsilon = FLOAT_EPSILON);

    engine.set_value("track1.gain", 0.3, 1.10);
    assert_eq!(session.store().len("track1.gain"), 2);
}

#[test]
fn test_thin_recorded_ramp() {
    let (session, _gain) = session_with_gain();
    let engine = session.engine();
    session.set_automation_mode(AutomationMode::Latch);
    engine.touch("track1.gain");

    for i in 0..=10 {
        let t = i as f64 * 0.1;
        engine.set_value("track1.gain", t as f32, t);
    }
    assert_eq!(session.store().len("track1.gain"), 11);

    assert_eq!(engine.thin_automation("track1.gain", 0.01), 9);
    let points = session.store().points("track1.gain");
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].time, 0.0);
    assert_relative_eq!(points[1].time, 1.0, epsilon = TIME_EPSILON);
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[test]
fn test_playback_only_while_rolling() {
    let (session, gain) = session_with_gain();
    session.store().add_point("track1.gain", 0.0, 0.25, CurveType::Linear);
    session.set_automation_mode(AutomationMode::Read);

    assert_eq!(session.tick().applied, 0);
    assert_eq!(gain.get(), 1.0);

    session.play();
    assert_eq!(session.tick().applied, 1);
    assert_eq!(gain.get(), 0.25);
}

#[test]
fn test_touch_overrides_playback() {
    let (session, _clock) = test_session();
    let target = RecordingTarget::new();
    session.register_parameter("pan", "track1", target.clone(), 0.0);
    session.store().add_point("pan", 0.0, -0.5, CurveType::Linear);
    session.set_automation_mode(AutomationMode::Read);
    session.play();

    session.engine().touch("pan");
    assert_eq!(session.tick().applied, 0);
    assert!(target.values().is_empty());

    session.engine().release("pan");
    assert_eq!(session.tick().applied, 1);
    assert_eq!(target.last(), Some(-0.5));
}

#[test]
fn test_playback_follows_transport() {
    let (session, clock) = test_session();
    let cutoff = Arc::new(AtomicFloat::new(0.0));
    session.register_parameter("filter.cutoff", "track2", cutoff.clone(), 0.0);
    session
        .store()
        .add_point("filter.cutoff", 0.0, 0.0, CurveType::SCurve);
    session
        .store()
        .add_point("filter.cutoff", 2.0, 1.0, CurveType::Linear);
    session.set_automation_mode(AutomationMode::Read);
    session.play();

    let mut seen = Vec::new();
    for _ in drive(&session, &clock, 0.25, 8) {
        seen.push(cutoff.get());
    }

    // S-curve rises monotonically and lands on the last point
    assert!(seen.windows(2).all(|w| w[1] >= w[0]));
    assert_relative_eq!(seen[3], 0.5, epsilon = CURVE_EPSILON);
    assert_relative_eq!(seen[7], 1.0, epsilon = CURVE_EPSILON);
}

#[test]
fn test_hold_curve_steps_at_next_point() {
    let (session, _gain) = session_with_gain();
    let store = session.store();
    store.add_point("track1.gain", 0.0, 0.0, CurveType::Hold);
    store.add_point("track1.gain", 1.0, 1.0, CurveType::Linear);

    assert_eq!(session.engine().value_at("track1.gain", 0.99), Some(0.0));
    assert_eq!(session.engine().value_at("track1.gain", 1.0), Some(1.0));
    assert_eq!(session.engine().value_at("unknown", 1.0), None);
}

#[test]
fn test_subscription_sees_playback() {
    let (session, _gain) = session_with_gain();
    let mut sub = session.engine().subscribe("track1.gain");
    session.store().add_point("track1.gain", 0.0, 0.6, CurveType::Linear);
    session.set_automation_mode(AutomationMode::Read);
    session.play();

    session.tick();
    session.tick();
    assert_eq!(sub.try_recv(), Some(0.6));
    assert_eq!(sub.try_recv(), None);
    assert_eq!(sub.latest(), Some(0.6));
}

#[test]
fn test_unregister_keeps_lane() {
    let (session, gain) = session_with_gain();
    session.store().add_point("track1.gain", 0.0, 0.1, CurveType::Linear);
    session.set_automation_mode(AutomationMode::Read);
    session.play();

    assert!(session.unregister_parameter("track1.gain"));
    assert_eq!(session.tick().applied, 0);
    assert_eq!(gain.get(), 1.0);
    assert_eq!(session.store().len("track1.gain"), 1);
}

#[test]
fn test_stop_releases_touches() {
    let (session, _gain) = session_with_gain();
    session.set_automation_mode(AutomationMode::Latch);
    session.engine().touch("track1.gain");

    session.stop();
    assert_eq!(session.engine().mode(), AutomationMode::Off);
    assert!(session.engine().touched().is_empty());
}

// ---------------------------------------------------------------------------
// Snapshots and persistence
// ---------------------------------------------------------------------------

#[test]
fn test_snapshot_uses_defaults_for_empty_lanes() {
    let (session, _clock) = test_session();
    session.register_parameter("a", "track1", Arc::new(AtomicFloat::new(0.0)), 0.3);
    session.register_parameter("b", "track1", Arc::new(AtomicFloat::new(0.0)), 0.0);
    session.store().add_point("b", 1.0, 0.9, CurveType::Linear);

    let snapshot = session.engine().snapshot();
    assert_eq!(snapshot.get("a"), Some(&0.3));
    assert_eq!(snapshot.get("b"), Some(&0.9));

    session.engine().clear_automation("b");
    session.engine().apply_snapshot(&snapshot, 4.0);
    for (lane, value) in [("a", 0.3), ("b", 0.9)] {
        let points = session.store().points(lane);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time, 4.0);
        assert_eq!(points[0].value, value);
    }
}

#[test]
fn test_export_load_through_json() {
    let (source, _gain) = session_with_gain();
    let store = source.store();
    store.add_point("track1.gain", 0.0, 0.0, CurveType::Exponential);
    store.add_point("track1.gain", 2.0, 1.0, CurveType::Linear);

    let json = serde_json::to_string(&source.engine().export_automation()).unwrap();
    let data: AutomationData = serde_json::from_str(&json).unwrap();

    let (restored, _gain) = session_with_gain();
    restored.engine().load_automation(data);
    for t in [0.0, 0.5, 1.0, 1.5, 2.0, 3.0] {
        assert_eq!(
            restored.engine().value_at("track1.gain", t),
            source.engine().value_at("track1.gain", t)
        );
    }
}
