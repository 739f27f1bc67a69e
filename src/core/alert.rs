//! Per-reading alert evaluation.

use crate::telemetry::types::Sample;
use serde::{Deserialize, Serialize};

/// Alert indicator shown for the latest reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Active,
    #[default]
    Clear,
}

impl AlertState {
    pub fn is_active(self) -> bool {
        self == AlertState::Active
    }
}

/// Evaluate one reading and bump `alert_count` when it raises an alert.
///
/// The producer's `alertTriggered` flag is authoritative. Readings from
/// producers that omit it fall back to `drowsinessLevel >= threshold`.
/// Every qualifying reading counts; there is no debounce.
pub fn evaluate_alert(sample: &Sample, alert_threshold: f64, alert_count: &mut u32) -> AlertState {
    let triggered = sample
        .alert_triggered
        .unwrap_or(sample.drowsiness_level >= alert_threshold);

    if triggered {
        *alert_count += 1;
        AlertState::Active
    } else {
        AlertState::Clear
    }
}
