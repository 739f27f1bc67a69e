//! Bounded, most-recent-first history of completed sessions.
//!
//! Storage sits behind [`HistoryBackend`] so the engine never touches files
//! directly. Any failure to read the slot degrades to an empty history, and
//! failed writes are logged without retry.

use crate::core::summary::SessionSummary;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum number of summaries kept.
pub const HISTORY_CAPACITY: usize = 10;

/// Key of the slot holding the history inside the slot file.
pub const HISTORY_SLOT: &str = "session_history";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Malformed history: {0}")]
    Malformed(String),
}

/// Durable storage for the history sequence.
pub trait HistoryBackend {
    /// Read the stored sequence. An absent slot is an empty sequence.
    fn load(&self) -> Result<Vec<SessionSummary>, HistoryError>;

    /// Replace the stored sequence.
    fn save(&mut self, entries: &[SessionSummary]) -> Result<(), HistoryError>;
}

/// A small JSON key-value file; the history lives under one named slot.
#[derive(Debug, Clone)]
pub struct SlotFileBackend {
    path: PathBuf,
    slot: String,
}

impl SlotFileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            slot: HISTORY_SLOT.to_string(),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_slots(&self) -> Result<serde_json::Map<String, serde_json::Value>, HistoryError> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<serde_json::Value>(&content)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(HistoryError::Malformed(format!(
                "expected an object of slots, found {}",
                json_kind(&other)
            ))),
        }
    }
}

impl HistoryBackend for SlotFileBackend {
    fn load(&self) -> Result<Vec<SessionSummary>, HistoryError> {
        let mut slots = self.read_slots()?;
        match slots.remove(&self.slot) {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(value @ serde_json::Value::Array(_)) => Ok(serde_json::from_value(value)?),
            Some(other) => Err(HistoryError::Malformed(format!(
                "slot '{}' holds {}, not a sequence",
                self.slot,
                json_kind(&other)
            ))),
        }
    }

    fn save(&mut self, entries: &[SessionSummary]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Keep other slots intact; an unreadable file is overwritten
        let mut slots = self.read_slots().unwrap_or_default();
        slots.insert(self.slot.clone(), serde_json::to_value(entries)?);

        let json = serde_json::to_string_pretty(&serde_json::Value::Object(slots))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Volatile backend, used when no data directory is available and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Vec<SessionSummary>,
}

impl HistoryBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<SessionSummary>, HistoryError> {
        Ok(self.entries.clone())
    }

    fn save(&mut self, entries: &[SessionSummary]) -> Result<(), HistoryError> {
        self.entries = entries.to_vec();
        Ok(())
    }
}

/// History of completed sessions, most recent first.
pub struct HistoryStore {
    backend: Box<dyn HistoryBackend>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(backend: impl HistoryBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            capacity: HISTORY_CAPACITY,
        }
    }

    /// History persisted under the slot file at `path`.
    pub fn with_file(path: PathBuf) -> Self {
        Self::new(SlotFileBackend::new(path))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    /// Stored summaries, or an empty list when the slot is missing or corrupt.
    pub fn load(&self) -> Vec<SessionSummary> {
        match self.backend.load() {
            Ok(mut entries) => {
                entries.truncate(self.capacity);
                entries
            }
            Err(e) => {
                warn!("Session history unreadable, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Prepend `summary`, drop anything past capacity and persist.
    ///
    /// Returns the updated history whether or not the write succeeded.
    pub fn record(&mut self, summary: SessionSummary) -> Vec<SessionSummary> {
        let mut entries = self.load();
        entries.insert(0, summary);
        entries.truncate(self.capacity);

        match self.backend.save(&entries) {
            Ok(()) => debug!("Recorded session summary ({} in history)", entries.len()),
            Err(e) => warn!("Could not persist session history: {}", e),
        }
        entries
    }

    /// Remove all stored summaries.
    pub fn clear(&mut self) {
        if let Err(e) = self.backend.save(&[]) {
            warn!("Could not clear session history: {}", e);
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
