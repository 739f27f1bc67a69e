//! Synthetic reading generator for running without a device.
//!
//! Each tick simulates a blink cycle, occasional head-tilt spikes and
//! battery drain, then emits a [`RawSample`] shaped exactly like a device
//! reading so it travels the same validation path.

use crate::telemetry::types::{HeadMovement, RawSample};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Minimum spacing between simulated blinks (about 20 per minute).
pub const BLINK_INTERVAL_MS: i64 = 3000;

/// Blink rate reported on a tick where a blink fired.
const BLINK_RATE_ON_FIRE: f64 = 20.0;

/// Per-tick chance of starting a tilt spike.
const TILT_SPIKE_PROBABILITY: f64 = 0.08;

/// Observed deflection above which a tilt counts as exceeded.
pub const TILT_LIMIT_DEGREES: f64 = 30.0;

/// Battery never drains below this level.
pub const BATTERY_FLOOR: f64 = 5.0;

/// Generator state, reset at session start and advanced once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorState {
    pub last_blink: DateTime<Utc>,
    pub blink_interval_ms: i64,
    pub battery_level: f64,
    pub tilt_cooldown_ticks: u32,
    pub base_tilt: HeadMovement,
}

impl SimulatorState {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            last_blink: now,
            blink_interval_ms: BLINK_INTERVAL_MS,
            battery_level: 100.0,
            tilt_cooldown_ticks: 0,
            base_tilt: HeadMovement::default(),
        }
    }
}

/// One generated reading plus the intermediate decisions behind it.
#[derive(Debug, Clone)]
pub struct SimulatedReading {
    pub raw: RawSample,
    pub blink_fired: bool,
    pub tilt_exceeded: bool,
}

pub struct Simulator {
    rng: StdRng,
    state: SimulatorState,
}

impl Simulator {
    /// Deterministic generator, mostly for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            state: SimulatorState::fresh(Utc::now()),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            state: SimulatorState::fresh(Utc::now()),
        }
    }

    pub fn state(&self) -> &SimulatorState {
        &self.state
    }

    /// Restart the blink timer, refill the battery and clear any tilt spike.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.state = SimulatorState::fresh(now);
    }

    /// Produce the reading for one tick at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>, alert_threshold: f64) -> SimulatedReading {
        let blink_fired = self.advance_blink(now);
        let eye_blink_rate = if blink_fired {
            BLINK_RATE_ON_FIRE
        } else {
            self.rng.gen_range(15.0..21.0)
        };
        let eye_closure_duration = if blink_fired {
            self.rng.gen_range(0.1..0.4)
        } else {
            self.rng.gen_range(0.0..0.05)
        };

        self.advance_tilt();
        let base = self.state.base_tilt;
        let observed = HeadMovement::new(
            base.pitch + self.rng.gen_range(-2.0..2.0),
            base.roll + self.rng.gen_range(-2.0..2.0),
            base.yaw + self.rng.gen_range(-2.0..2.0),
        );
        let tilt_exceeded = observed.max_abs_deflection() > TILT_LIMIT_DEGREES;

        let mut drowsiness: f64 = self.rng.gen_range(35.0..50.0);
        if blink_fired {
            drowsiness += self.rng.gen_range(20.0..30.0);
        }
        if tilt_exceeded {
            drowsiness += self.rng.gen_range(20.0..35.0);
        }
        let drowsiness = drowsiness.clamp(0.0, 100.0);

        let drain: f64 = self.rng.gen_range(0.15..0.25);
        self.state.battery_level = (self.state.battery_level - drain).max(BATTERY_FLOOR);

        let raw = RawSample {
            timestamp: Some(now.timestamp_millis()),
            eye_blink_rate: Some(eye_blink_rate),
            eye_closure_duration: Some(eye_closure_duration),
            head_movement: Some(observed),
            drowsiness_level: Some(drowsiness),
            alert_triggered: Some(drowsiness >= alert_threshold || tilt_exceeded),
            battery_level: Some(self.state.battery_level),
        };

        SimulatedReading {
            raw,
            blink_fired,
            tilt_exceeded,
        }
    }

    fn advance_blink(&mut self, now: DateTime<Utc>) -> bool {
        let elapsed = now - self.state.last_blink;
        if elapsed >= Duration::milliseconds(self.state.blink_interval_ms) {
            self.state.last_blink = now;
            true
        } else {
            false
        }
    }

    fn advance_tilt(&mut self) {
        if self.state.tilt_cooldown_ticks > 0 {
            self.state.tilt_cooldown_ticks -= 1;
            if self.state.tilt_cooldown_ticks == 0 {
                self.state.base_tilt = HeadMovement::default();
            }
            return;
        }

        if !self.rng.gen_bool(TILT_SPIKE_PROBABILITY) {
            return;
        }

        let magnitude: f64 = self.rng.gen_range(30.0..50.0);
        let deflection = if self.rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude
        };

        let mut base = HeadMovement::default();
        match self.rng.gen_range(0..3) {
            0 => base.pitch = deflection,
            1 => base.roll = deflection,
            _ => base.yaw = deflection,
        }
        self.state.base_tilt = base;
        self.state.tilt_cooldown_ticks = self.rng.gen_range(2..=3);
    }
}
