//! Demonstration of a monitoring session driven by the synthetic generator.
//!
//! This example shows how to:
//! 1. Create a session engine with an in-memory history
//! 2. Subscribe to display updates
//! 3. Feed generated readings through validation and alerting
//! 4. Stop the session and inspect the summary and export
//!
//! Run with: cargo run --example simulate_demo

use chrono::{Duration, Utc};
use fatigue_monitor::{
    core::{AlertState, EngineEvent},
    HistoryStore, SessionEngine, Simulator, Thresholds,
};

fn main() {
    println!("Fatigue Monitor - Simulation Demo");
    println!("=================================");
    println!();

    let thresholds = Thresholds::default();
    let mut engine = SessionEngine::new(thresholds, HistoryStore::in_memory());

    engine.subscribe(|event: &EngineEvent| match event {
        EngineEvent::SessionStarted { session_id, .. } => {
            println!("Session {session_id} started");
        }
        EngineEvent::SampleAccepted(update) => {
            let sample = &update.latest;
            println!(
                "  drowsiness {:5.1}%  blink {:4.1}/min  tilt {:5.1}°  window {:2}  {}",
                sample.drowsiness_level,
                sample.eye_blink_rate,
                sample.head_movement.max_abs_deflection(),
                update.window.len(),
                if update.alert == AlertState::Active { "ALERT" } else { "" }
            );
        }
        EngineEvent::SessionStopped { .. } => println!("Session stopped"),
    });

    let start = Utc::now();
    if let Err(e) = engine.start_at(start) {
        eprintln!("Could not start session: {e}");
        return;
    }

    // Fixed seed so repeated runs print the same session
    let mut simulator = Simulator::with_seed(7);
    simulator.reset(start);

    let mut tilt_events = 0;
    for i in 1..=30 {
        let now = start + Duration::seconds(2 * i);
        let reading = simulator.tick(now, thresholds.alert_threshold_f64());
        if reading.tilt_exceeded {
            tilt_events += 1;
        }
        engine.on_sample_at(Some(reading.raw), now);
    }

    if let Ok(export) = engine.export() {
        println!();
        println!("Export ready: {} readings", export.samples.len());
    }

    let end = start + Duration::seconds(60);
    match engine.stop_at(end) {
        Some(summary) => {
            println!();
            println!("Summary");
            println!("-------");
            println!("  Duration:        {}", summary.duration_hms());
            println!("  Readings:        {}", summary.sample_count);
            println!("  Alerts:          {}", summary.total_alerts);
            println!("  Tilt events:     {tilt_events}");
            println!("  Avg blink rate:  {:.1}/min", summary.avg_blink_rate);
            println!("  Peak drowsiness: {:.1}%", summary.peak_drowsiness);
        }
        None => println!("No readings were recorded."),
    }

    println!();
    println!("History holds {} session(s)", engine.history().load().len());
}
