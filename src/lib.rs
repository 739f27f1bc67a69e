//! Fatigue Monitor - session engine for wearable drowsiness telemetry.
//!
//! This library ingests readings from a wearable sensor (or a synthetic
//! generator), keeps a rolling real-time view of the latest readings,
//! raises alerts on drowsiness or excessive head tilt, and keeps a short
//! history of completed sessions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Fatigue Monitor                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Transport  │──▶│  Validator  │──▶│   Session   │       │
//! │  │ / Simulator │   │             │   │   Engine    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                        │    │    │          │
//! │                         ┌──────────────┘    │    └───────┐  │
//! │                         ▼                   ▼            ▼  │
//! │                  ┌─────────────┐   ┌────────────┐ ┌───────┐ │
//! │                  │   Rolling   │   │   Alert    │ │History│ │
//! │                  │   Window    │   │  Detector  │ │ Store │ │
//! │                  └─────────────┘   └────────────┘ └───────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fatigue_monitor::{core::EngineEvent, HistoryStore, SessionEngine, Simulator, Thresholds};
//! use chrono::{Duration, Utc};
//!
//! let mut engine = SessionEngine::new(Thresholds::default(), HistoryStore::in_memory());
//! engine.subscribe(|event: &EngineEvent| {
//!     if let EngineEvent::SampleAccepted(update) = event {
//!         println!("drowsiness {:.0}% ({:?})", update.latest.drowsiness_level, update.alert);
//!     }
//! });
//!
//! let start = Utc::now();
//! engine.start_at(start).expect("no session is active yet");
//!
//! let mut simulator = Simulator::from_entropy();
//! simulator.reset(start);
//! for i in 1..=5 {
//!     let now = start + Duration::seconds(2 * i);
//!     let reading = simulator.tick(now, 70.0);
//!     engine.on_sample_at(Some(reading.raw), now);
//! }
//!
//! let summary = engine.stop();
//! ```

pub mod config;
pub mod core;
pub mod history;
pub mod runtime;
pub mod telemetry;
pub mod transport;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, Thresholds};
pub use core::{
    AlertState, DisplayUpdate, EngineEvent, EngineObserver, IngestOutcome, SessionEngine,
    SessionStats, SessionSummary,
};
pub use history::{HistoryBackend, HistoryStore};
pub use runtime::{Monitor, MonitorCommand, MonitorEvent};
pub use telemetry::{RawSample, Sample, Simulator};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
