//! Integration tests for the session engine through the public API

use chrono::{DateTime, Duration, TimeZone, Utc};
use fatigue_monitor::{
    core::{AlertState, EngineEvent, IngestOutcome, ROLLING_WINDOW_CAPACITY},
    history::{HistoryStore, HISTORY_CAPACITY},
    telemetry::{HeadMovement, RawSample, Rejection},
    SessionEngine, Simulator, Thresholds,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

fn reading(blink: f64, drowsy: f64, alert: Option<bool>) -> RawSample {
    RawSample {
        eye_blink_rate: Some(blink),
        head_movement: Some(HeadMovement::default()),
        drowsiness_level: Some(drowsy),
        alert_triggered: alert,
        ..RawSample::default()
    }
}

fn engine() -> SessionEngine {
    SessionEngine::new(Thresholds::default(), HistoryStore::in_memory())
}

fn run_session(engine: &mut SessionEngine, start: DateTime<Utc>, samples: usize) {
    engine.start_at(start).unwrap();
    for i in 0..samples {
        let now = start + Duration::seconds(2 * (i as i64 + 1));
        engine.on_sample_at(Some(reading(15.0, 40.0, Some(false))), now);
    }
    engine.stop_at(start + Duration::seconds(60));
}

#[test]
fn test_rejected_readings_do_not_count() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();

    let inputs = vec![
        Some(reading(12.0, 20.0, None)),
        None,
        Some(RawSample {
            head_movement: None,
            ..reading(12.0, 20.0, None)
        }),
        Some(reading(f64::NAN, 20.0, None)),
        Some(reading(14.0, 25.0, None)),
    ];

    let mut accepted = 0;
    for (i, raw) in inputs.into_iter().enumerate() {
        let now = t0() + Duration::seconds(i as i64 + 1);
        if let IngestOutcome::Accepted(_) = engine.on_sample_at(raw, now) {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 2);
    assert_eq!(engine.session().unwrap().samples.len(), 2);
    assert_eq!(engine.stats().unwrap().sample_count, 2);
}

#[test]
fn test_rejection_reasons() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();

    assert_eq!(
        engine.on_sample_at(None, t0()),
        IngestOutcome::Rejected(Rejection::Absent)
    );
    assert_eq!(
        engine.on_sample_at(
            Some(RawSample {
                head_movement: None,
                ..reading(12.0, 20.0, None)
            }),
            t0()
        ),
        IngestOutcome::Rejected(Rejection::MissingHeadMovement)
    );
    assert!(matches!(
        engine.on_sample_at(Some(reading(12.0, f64::INFINITY, None)), t0()),
        IngestOutcome::Rejected(Rejection::NotFinite(_))
    ));
    assert!(engine.is_active());
}

#[test]
fn test_idle_engine_ignores_readings() {
    let mut engine = engine();
    assert_eq!(
        engine.on_sample_at(Some(reading(12.0, 20.0, None)), t0()),
        IngestOutcome::Idle
    );
    assert!(engine.session().is_none());
    assert!(engine.history().load().is_empty());
}

#[test]
fn test_window_keeps_last_twenty_in_order() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();

    for i in 0..25 {
        let now = t0() + Duration::seconds(i + 1);
        engine.on_sample_at(Some(reading(i as f64, 10.0, Some(false))), now);
        assert!(engine.window().len() <= ROLLING_WINDOW_CAPACITY);
    }

    let blinks: Vec<f64> = engine.window().iter().map(|p| p.eye_blink_rate).collect();
    let expected: Vec<f64> = (5..25).map(|i| i as f64).collect();
    assert_eq!(blinks, expected);
    assert_eq!(engine.session().unwrap().samples.len(), 25);
}

#[test]
fn test_alert_count_ignores_threshold_changes() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();

    let flags = [true, false, true, true, false];
    for (i, flag) in flags.iter().enumerate() {
        // Swing the threshold between extremes mid-session
        engine.set_thresholds(Thresholds {
            alert_threshold: if i % 2 == 0 { 0 } else { 100 },
            normal_blink_rate: 17.0,
        });
        let now = t0() + Duration::seconds(i as i64 + 1);
        let outcome = engine.on_sample_at(Some(reading(15.0, 50.0, Some(*flag))), now);
        let expected = if *flag {
            AlertState::Active
        } else {
            AlertState::Clear
        };
        assert_eq!(outcome, IngestOutcome::Accepted(expected));
    }

    assert_eq!(engine.session().unwrap().alert_count, 3);
}

#[test]
fn test_threshold_applies_when_flag_missing() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();

    assert_eq!(
        engine.on_sample_at(Some(reading(15.0, 69.9, None)), t0()),
        IngestOutcome::Accepted(AlertState::Clear)
    );
    assert_eq!(
        engine.on_sample_at(Some(reading(15.0, 70.0, None)), t0()),
        IngestOutcome::Accepted(AlertState::Active)
    );
    assert_eq!(engine.alert_state(), AlertState::Active);
}

#[test]
fn test_known_sequence_statistics() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();
    engine.on_sample_at(Some(reading(10.0, 20.0, None)), t0() + Duration::seconds(2));
    engine.on_sample_at(Some(reading(20.0, 80.0, None)), t0() + Duration::seconds(4));

    let stats = engine.stats().unwrap();
    assert!((stats.avg_blink_rate - 15.0).abs() < 1e-9);
    assert!((stats.peak_drowsiness - 80.0).abs() < 1e-9);
    assert_eq!(stats.duration_ms, 4000);
    assert_eq!(stats.alert_count, 1);

    let summary = engine.stop_at(t0() + Duration::seconds(10)).unwrap();
    assert_eq!(summary.sample_count, 2);
    assert_eq!(summary.duration_ms, 10_000);
    assert!((summary.avg_blink_rate - 15.0).abs() < 1e-9);
}

#[test]
fn test_empty_session_leaves_history_untouched() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();
    assert!(engine.stop_at(t0() + Duration::seconds(5)).is_none());
    assert!(engine.history().load().is_empty());
}

#[test]
fn test_history_is_newest_first_and_capped() {
    let mut engine = engine();

    for i in 0..12 {
        run_session(&mut engine, t0() + Duration::hours(i), 3);
    }

    let history = engine.history().load();
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert_eq!(history[0].start, t0() + Duration::hours(11));
    assert_eq!(history[9].start, t0() + Duration::hours(2));
}

#[test]
fn test_stop_twice_is_noop() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();
    engine.on_sample_at(Some(reading(15.0, 30.0, None)), t0());

    assert!(engine.stop_at(t0() + Duration::seconds(30)).is_some());
    assert!(engine.stop_at(t0() + Duration::seconds(40)).is_none());

    let history = engine.history().load();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].end, t0() + Duration::seconds(30));
}

#[test]
fn test_restart_resets_session_state() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();
    for i in 0..5 {
        engine.on_sample_at(Some(reading(15.0, 90.0, Some(true))), t0() + Duration::seconds(i));
    }
    engine.stop_at(t0() + Duration::seconds(10));

    let second = t0() + Duration::minutes(5);
    engine.start_at(second).unwrap();
    assert!(engine.window().is_empty());
    assert!(engine.latest().is_none());
    assert!(engine.stats().is_none());
    assert_eq!(engine.alert_state(), AlertState::Clear);

    let session = engine.session().unwrap();
    assert!(session.samples.is_empty());
    assert_eq!(session.alert_count, 0);
    assert_eq!(session.start_time, second);
}

#[test]
fn test_start_while_active_is_rejected() {
    let mut engine = engine();
    let first = engine.start_at(t0()).unwrap();
    engine.on_sample_at(Some(reading(15.0, 30.0, None)), t0());

    assert!(engine.start_at(t0() + Duration::seconds(5)).is_err());
    let session = engine.session().unwrap();
    assert_eq!(session.id, first);
    assert_eq!(session.samples.len(), 1);
}

#[test]
fn test_observer_sees_lifecycle() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut engine = engine();
    engine.subscribe(move |event: &EngineEvent| {
        let tag = match event {
            EngineEvent::SessionStarted { .. } => "started".to_string(),
            EngineEvent::SampleAccepted(update) => format!("sample:{}", update.window.len()),
            EngineEvent::SessionStopped { summary, .. } => {
                format!("stopped:{}", summary.is_some())
            }
        };
        sink.borrow_mut().push(tag);
    });

    engine.start_at(t0()).unwrap();
    engine.on_sample_at(Some(reading(15.0, 30.0, None)), t0());
    engine.on_sample_at(None, t0());
    engine.on_sample_at(Some(reading(15.0, 30.0, None)), t0());
    engine.stop_at(t0() + Duration::seconds(5));
    engine.stop_at(t0() + Duration::seconds(6));

    assert_eq!(
        *seen.borrow(),
        vec!["started", "sample:1", "sample:2", "stopped:true"]
    );
}

#[test]
fn test_export_requires_readings() {
    let mut engine = engine();
    assert!(engine.export().is_err());

    engine.start_at(t0()).unwrap();
    assert!(engine.export().is_err());

    engine.on_sample_at(Some(reading(15.0, 30.0, None)), t0() + Duration::seconds(1));
    engine.stop_at(t0() + Duration::seconds(5));

    let export = engine.export().unwrap();
    assert!(!export.active);
    assert_eq!(export.samples.len(), 1);

    let json = serde_json::to_value(&export).unwrap();
    assert_eq!(json["samples"][0]["eyeBlinkRate"], 15.0);
    assert!(json["sessionId"].is_string());
}

#[test]
fn test_simulated_session_end_to_end() {
    let mut engine = engine();
    let mut simulator = Simulator::with_seed(2024);
    engine.start_at(t0()).unwrap();
    simulator.reset(t0());

    let mut expected_alerts = 0;
    for i in 1..=100 {
        let now = t0() + Duration::seconds(2 * i);
        let reading = simulator.tick(now, 70.0);
        assert_eq!(
            reading.tilt_exceeded,
            reading.raw.head_movement.unwrap().max_abs_deflection() > 30.0
        );
        if reading.raw.alert_triggered == Some(true) {
            expected_alerts += 1;
        }
        assert!(matches!(
            engine.on_sample_at(Some(reading.raw), now),
            IngestOutcome::Accepted(_)
        ));
    }

    let summary = engine.stop_at(t0() + Duration::seconds(200)).unwrap();
    assert_eq!(summary.sample_count, 100);
    assert_eq!(summary.total_alerts, expected_alerts);
}

#[test]
fn test_history_survives_restart_on_disk() {
    let dir = std::env::temp_dir().join(format!("fatigue-monitor-it-{}", uuid::Uuid::new_v4()));
    let path: PathBuf = dir.join("history.json");

    {
        let mut engine = SessionEngine::new(Thresholds::default(), HistoryStore::with_file(path.clone()));
        run_session(&mut engine, t0(), 4);
    }

    let reopened = HistoryStore::with_file(path.clone());
    let history = reopened.load();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sample_count, 4);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_undecodable_timestamp_keeps_session_alive() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();

    let raw: RawSample = serde_json::from_str(
        r#"{"timestamp": -1e300, "eyeBlinkRate": 15, "drowsinessLevel": 30, "headMovement": {}}"#,
    )
    .unwrap();
    let received = t0() + Duration::seconds(3);

    assert!(matches!(
        engine.on_sample_at(Some(raw), received),
        IngestOutcome::Accepted(_)
    ));
    assert_eq!(engine.latest().unwrap().timestamp, received);
    assert!(engine.stop_at(t0() + Duration::seconds(5)).is_some());
}

#[test]
fn test_boot_offsets_anchor_on_first_accepted_reading() {
    let mut engine = engine();
    engine.start_at(t0()).unwrap();

    let boot = |millis: i64, head: Option<HeadMovement>| RawSample {
        timestamp: Some(millis),
        head_movement: head,
        ..reading(15.0, 30.0, None)
    };

    // Rejected reading arrives first and must not fix the anchor
    let rejected = engine.on_sample_at(Some(boot(1_000, None)), t0());
    assert_eq!(rejected, IngestOutcome::Rejected(Rejection::MissingHeadMovement));

    let first = t0() + Duration::seconds(50);
    engine.on_sample_at(Some(boot(1_000, Some(HeadMovement::default()))), first);
    engine.on_sample_at(
        Some(boot(3_000, Some(HeadMovement::default()))),
        first + Duration::seconds(10),
    );

    let samples = &engine.session().unwrap().samples;
    assert_eq!(samples[0].timestamp, first);
    assert_eq!(samples[1].timestamp, first + Duration::seconds(2));
}
