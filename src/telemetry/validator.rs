//! Shape and type checks applied to every reading before it reaches a session.

use crate::telemetry::types::{RawSample, Sample};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a reading was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("sample is absent")]
    Absent,
    #[error("sample has no headMovement")]
    MissingHeadMovement,
    #[error("{0} is not a finite number")]
    NotFinite(&'static str),
}

/// Validate a raw reading whose timestamp has already been resolved.
///
/// Only `headMovement`, `eyeBlinkRate` and `drowsinessLevel` are required.
/// A missing closure duration reads as zero; missing battery and alert
/// fields stay absent.
pub fn validate(raw: Option<&RawSample>, timestamp: DateTime<Utc>) -> Result<Sample, Rejection> {
    let raw = raw.ok_or(Rejection::Absent)?;
    let head_movement = raw.head_movement.ok_or(Rejection::MissingHeadMovement)?;
    let eye_blink_rate = finite(raw.eye_blink_rate, "eyeBlinkRate")?;
    let drowsiness_level = finite(raw.drowsiness_level, "drowsinessLevel")?;
    finite(Some(head_movement.pitch), "headMovement.pitch")?;
    finite(Some(head_movement.roll), "headMovement.roll")?;
    finite(Some(head_movement.yaw), "headMovement.yaw")?;

    Ok(Sample {
        timestamp,
        eye_blink_rate,
        eye_closure_duration: raw
            .eye_closure_duration
            .filter(|v| v.is_finite())
            .unwrap_or(0.0),
        head_movement,
        drowsiness_level,
        alert_triggered: raw.alert_triggered,
        battery_level: raw.battery_level.filter(|v| v.is_finite()),
    })
}

fn finite(value: Option<f64>, field: &'static str) -> Result<f64, Rejection> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(Rejection::NotFinite(field)),
    }
}
