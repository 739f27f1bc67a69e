//! Telemetry input for the fatigue monitor.
//!
//! This module holds the reading types, timestamp resolution, validation
//! and the synthetic generator used when no device is attached.

pub mod clock;
pub mod simulator;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use clock::{DeviceClock, ResolvedTime};
pub use simulator::{SimulatedReading, Simulator, SimulatorState};
pub use types::{ConnectionStatus, HeadMovement, RawSample, Sample};
pub use validator::{validate, Rejection};
