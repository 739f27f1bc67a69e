//! Session history for the fatigue monitor.
//!
//! Completed-session summaries are kept in a small durable slot so they
//! survive restarts and can be reviewed later.

pub mod store;

// Re-export commonly used types
pub use store::{
    HistoryBackend, HistoryError, HistoryStore, MemoryBackend, SlotFileBackend, HISTORY_CAPACITY,
    HISTORY_SLOT,
};
