//! Rolling display window over the most recent accepted readings.
//!
//! The window keeps only the projection needed for live charts and is
//! independent of the full sample sequence kept for statistics and export.

use crate::telemetry::types::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of readings kept for display.
pub const ROLLING_WINDOW_CAPACITY: usize = 20;

/// Display projection of one accepted reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowPoint {
    pub timestamp: DateTime<Utc>,
    pub drowsiness_level: f64,
    pub eye_blink_rate: f64,
}

impl From<&Sample> for WindowPoint {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp: sample.timestamp,
            drowsiness_level: sample.drowsiness_level,
            eye_blink_rate: sample.eye_blink_rate,
        }
    }
}

/// Fixed-capacity FIFO of [`WindowPoint`]s, oldest first.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    points: VecDeque<WindowPoint>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new() -> Self {
        Self::with_capacity(ROLLING_WINDOW_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest once over capacity.
    pub fn push(&mut self, sample: &Sample) {
        self.points.push_back(WindowPoint::from(sample));
        if self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowPoint> {
        self.points.iter()
    }

    /// Copy of the window contents in arrival order.
    pub fn to_vec(&self) -> Vec<WindowPoint> {
        self.points.iter().copied().collect()
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new()
    }
}
