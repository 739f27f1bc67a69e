//! Core functionality for the fatigue monitor.
//!
//! This module contains:
//! - The session engine and its observer/export contracts
//! - The rolling display window
//! - Alert evaluation
//! - Running statistics and completed-session summaries

pub mod alert;
pub mod engine;
pub mod stats;
pub mod summary;
pub mod windowing;

// Re-export commonly used types
pub use alert::{evaluate_alert, AlertState};
pub use engine::{
    DisplayUpdate, EngineError, EngineEvent, EngineObserver, ExportError, IngestOutcome, Session,
    SessionEngine, SessionExport, SessionPhase,
};
pub use stats::{compute_stats, SessionStats};
pub use summary::SessionSummary;
pub use windowing::{RollingWindow, WindowPoint, ROLLING_WINDOW_CAPACITY};
