//! Summary records for completed sessions.

use crate::core::stats::compute_stats;
use crate::telemetry::types::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate statistics of one completed session.
///
/// Computed once when the session stops and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session identifier (absent in records written by older producers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
    pub total_alerts: u32,
    pub avg_blink_rate: f64,
    pub peak_drowsiness: f64,
    pub sample_count: usize,
}

impl SessionSummary {
    /// Summarize a finished session. Returns `None` for a session without
    /// accepted readings.
    pub fn from_samples(
        session_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        samples: &[Sample],
        total_alerts: u32,
    ) -> Option<Self> {
        let stats = compute_stats(samples, start, end, total_alerts)?;

        Some(Self {
            session_id: Some(session_id),
            start,
            end,
            duration_ms: stats.duration_ms,
            total_alerts,
            avg_blink_rate: stats.avg_blink_rate,
            peak_drowsiness: stats.peak_drowsiness,
            sample_count: stats.sample_count,
        })
    }

    /// Duration formatted as `HH:MM:SS`.
    pub fn duration_hms(&self) -> String {
        let secs = self.duration_ms.max(0) / 1000;
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
