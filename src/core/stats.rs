//! Running statistics over the accepted readings of a session.
//!
//! Statistics are recomputed from the full sample sequence on every accepted
//! reading rather than maintained incrementally, which keeps them exact at
//! the cost of O(n) work per reading.

use crate::telemetry::types::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Statistics snapshot for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Milliseconds since the session started
    pub duration_ms: i64,
    /// Mean blink rate over all accepted readings
    pub avg_blink_rate: f64,
    /// Highest drowsiness level seen
    pub peak_drowsiness: f64,
    /// Number of accepted readings
    pub sample_count: usize,
    /// Number of readings that raised an alert
    pub alert_count: u32,
}

/// Compute statistics for `samples`, or `None` when there are none.
pub fn compute_stats(
    samples: &[Sample],
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    alert_count: u32,
) -> Option<SessionStats> {
    if samples.is_empty() {
        return None;
    }

    let blink_rates: Vec<f64> = samples.iter().map(|s| s.eye_blink_rate).collect();
    let drowsiness: Vec<f64> = samples.iter().map(|s| s.drowsiness_level).collect();

    Some(SessionStats {
        duration_ms: (now - start).num_milliseconds(),
        avg_blink_rate: blink_rates.iter().mean(),
        peak_drowsiness: Statistics::max(drowsiness.iter()),
        sample_count: samples.len(),
        alert_count,
    })
}
