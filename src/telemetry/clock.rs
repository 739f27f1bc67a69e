//! Conversion of transport timestamps into absolute instants.
//!
//! Devices either stamp readings with epoch milliseconds or with a
//! millisecond offset since boot. Boot-relative offsets are anchored on the
//! first such reading seen after [`DeviceClock::reset`].

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Smallest value treated as epoch milliseconds (September 2001).
pub const EPOCH_MILLIS_FLOOR: i64 = 1_000_000_000_000;

#[derive(Debug, Clone, Default)]
pub struct DeviceClock {
    boot_anchor: Option<DateTime<Utc>>,
}

/// A timestamp resolved without touching the clock.
///
/// Pass it to [`DeviceClock::commit`] once the reading is accepted so the
/// boot anchor it implies is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    pub timestamp: DateTime<Utc>,
    anchor: Option<DateTime<Utc>>,
}

impl ResolvedTime {
    fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            anchor: None,
        }
    }
}

impl DeviceClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the boot anchor (called at session start).
    pub fn reset(&mut self) {
        self.boot_anchor = None;
    }

    pub fn boot_anchor(&self) -> Option<DateTime<Utc>> {
        self.boot_anchor
    }

    /// Resolve a raw timestamp received at `received_at` without changing
    /// the anchor.
    ///
    /// Negative values and offsets that do not fit the calendar fall back
    /// to the receive time.
    pub fn peek(&self, raw: Option<i64>, received_at: DateTime<Utc>) -> ResolvedTime {
        let Some(millis) = raw else {
            return ResolvedTime::at(received_at);
        };

        if millis >= EPOCH_MILLIS_FLOOR {
            let timestamp = Utc
                .timestamp_millis_opt(millis)
                .single()
                .unwrap_or(received_at);
            return ResolvedTime::at(timestamp);
        }
        if millis < 0 {
            return ResolvedTime::at(received_at);
        }

        let Some(offset) = Duration::try_milliseconds(millis) else {
            return ResolvedTime::at(received_at);
        };

        match self.boot_anchor {
            Some(anchor) => {
                ResolvedTime::at(anchor.checked_add_signed(offset).unwrap_or(received_at))
            }
            None => match received_at.checked_sub_signed(offset) {
                Some(anchor) => ResolvedTime {
                    timestamp: received_at,
                    anchor: Some(anchor),
                },
                None => ResolvedTime::at(received_at),
            },
        }
    }

    /// Keep the boot anchor implied by an accepted reading.
    pub fn commit(&mut self, resolved: &ResolvedTime) {
        if self.boot_anchor.is_none() {
            self.boot_anchor = resolved.anchor;
        }
    }

    /// Resolve and commit in one step.
    pub fn resolve(&mut self, raw: Option<i64>, received_at: DateTime<Utc>) -> DateTime<Utc> {
        let resolved = self.peek(raw, received_at);
        self.commit(&resolved);
        resolved.timestamp
    }
}
