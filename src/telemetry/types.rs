//! Telemetry reading types for the fatigue monitor.
//!
//! [`RawSample`] is the wire shape delivered by a transport or the generator.
//! [`Sample`] is the validated reading the session engine works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadMovement {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

impl HeadMovement {
    pub fn new(pitch: f64, roll: f64, yaw: f64) -> Self {
        Self { pitch, roll, yaw }
    }

    /// Largest absolute deflection across the three axes.
    pub fn max_abs_deflection(&self) -> f64 {
        self.pitch.abs().max(self.roll.abs()).max(self.yaw.abs())
    }
}

/// A validated telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Absolute time of the reading
    pub timestamp: DateTime<Utc>,
    /// Blinks per minute
    pub eye_blink_rate: f64,
    /// Seconds the eyes were closed within the sampling interval
    pub eye_closure_duration: f64,
    /// Head orientation at the time of the reading
    pub head_movement: HeadMovement,
    /// Drowsiness score in [0, 100]
    pub drowsiness_level: f64,
    /// Alert decision made by the producer; `None` for legacy producers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_triggered: Option<bool>,
    /// Battery percentage, when the producer reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
}

/// A reading as decoded from the transport, before validation.
///
/// Numeric reading fields decode leniently: a JSON value that is not a
/// number becomes NaN so the validator can reject it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSample {
    /// Epoch milliseconds or a boot-relative offset in milliseconds
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub eye_blink_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub eye_closure_duration: Option<f64>,
    #[serde(default)]
    pub head_movement: Option<HeadMovement>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub drowsiness_level: Option<f64>,
    #[serde(default)]
    pub alert_triggered: Option<bool>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub battery_level: Option<f64>,
}

/// Connectivity of the inbound transport. The engine never owns this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.map(|v| v.as_f64().unwrap_or(f64::NAN)))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
    }))
}
