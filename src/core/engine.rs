//! Session engine: lifecycle, ingestion and the state derived from it.
//!
//! The engine owns the single session slot. It moves between
//! [`SessionPhase::Idle`] and [`SessionPhase::Active`] through
//! [`SessionEngine::start`] and [`SessionEngine::stop`], accepts readings
//! only while active, and publishes typed [`EngineEvent`]s to subscribed
//! observers instead of touching any display directly.

use crate::config::Thresholds;
use crate::core::alert::{evaluate_alert, AlertState};
use crate::core::stats::{compute_stats, SessionStats};
use crate::core::summary::SessionSummary;
use crate::core::windowing::{RollingWindow, WindowPoint};
use crate::history::HistoryStore;
use crate::telemetry::clock::DeviceClock;
use crate::telemetry::types::{RawSample, Sample};
use crate::telemetry::validator::{validate, Rejection};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Active,
}

/// One monitoring period. Frozen once `end_time` is set.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub samples: Vec<Sample>,
    pub alert_count: u32,
}

impl Session {
    fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time: None,
            samples: Vec::new(),
            alert_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Everything a display needs after an accepted reading.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayUpdate {
    pub latest: Sample,
    pub window: Vec<WindowPoint>,
    pub alert: AlertState,
    pub stats: SessionStats,
    /// Reference blink rate in effect when the reading was evaluated
    pub normal_blink_rate: f64,
}

/// State changes published by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    SessionStarted {
        session_id: Uuid,
        start: DateTime<Utc>,
    },
    SampleAccepted(DisplayUpdate),
    SessionStopped {
        session_id: Uuid,
        summary: Option<SessionSummary>,
    },
}

/// Subscriber to [`EngineEvent`]s.
pub trait EngineObserver {
    fn on_event(&mut self, event: &EngineEvent);
}

impl<F> EngineObserver for F
where
    F: FnMut(&EngineEvent),
{
    fn on_event(&mut self, event: &EngineEvent) {
        self(event)
    }
}

/// Result of handing a raw reading to [`SessionEngine::on_sample`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted(AlertState),
    Rejected(Rejection),
    /// Valid reading, but no session is active
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("a session is already active")]
    SessionActive,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("no readings recorded in the current session")]
    EmptySession,
}

/// Data handed to export collaborators. The engine does no formatting.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport<'a> {
    pub session_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub active: bool,
    pub stats: SessionStats,
    pub samples: &'a [Sample],
}

pub struct SessionEngine {
    phase: SessionPhase,
    /// Current session, or the most recently stopped one
    session: Option<Session>,
    window: RollingWindow,
    latest: Option<Sample>,
    alert_state: AlertState,
    stats: Option<SessionStats>,
    thresholds: Thresholds,
    clock: DeviceClock,
    history: HistoryStore,
    observers: Vec<Box<dyn EngineObserver>>,
}

impl SessionEngine {
    pub fn new(thresholds: Thresholds, history: HistoryStore) -> Self {
        Self {
            phase: SessionPhase::Idle,
            session: None,
            window: RollingWindow::new(),
            latest: None,
            alert_state: AlertState::Clear,
            stats: None,
            thresholds,
            clock: DeviceClock::new(),
            history,
            observers: Vec::new(),
        }
    }

    /// Register an observer for all subsequent events.
    pub fn subscribe(&mut self, observer: impl EngineObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Replace the live evaluation inputs. Only later readings see them.
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        if thresholds != self.thresholds {
            info!(
                "Thresholds updated: alert at {}%, reference blink rate {:.1}/min",
                thresholds.alert_threshold, thresholds.normal_blink_rate
            );
            self.thresholds = thresholds;
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    pub fn alert_state(&self) -> AlertState {
        self.alert_state
    }

    /// Running statistics; `None` until the session has a reading.
    pub fn stats(&self) -> Option<SessionStats> {
        self.stats
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn start(&mut self) -> Result<Uuid, EngineError> {
        self.start_at(Utc::now())
    }

    /// Begin a new session at `now`, clearing all per-session state.
    pub fn start_at(&mut self, now: DateTime<Utc>) -> Result<Uuid, EngineError> {
        if self.is_active() {
            warn!("Ignoring start: a session is already active");
            return Err(EngineError::SessionActive);
        }

        let session = Session::new(now);
        let session_id = session.id;
        self.session = Some(session);
        self.window.reset();
        self.latest = None;
        self.alert_state = AlertState::Clear;
        self.stats = None;
        self.clock.reset();
        self.phase = SessionPhase::Active;

        info!("Session {} started", session_id);
        self.emit(EngineEvent::SessionStarted {
            session_id,
            start: now,
        });
        Ok(session_id)
    }

    pub fn stop(&mut self) -> Option<SessionSummary> {
        self.stop_at(Utc::now())
    }

    /// End the active session at `now`.
    ///
    /// A session with at least one reading is summarized and recorded in
    /// history. Stopping while idle does nothing.
    pub fn stop_at(&mut self, now: DateTime<Utc>) -> Option<SessionSummary> {
        if !self.is_active() {
            debug!("Ignoring stop: no active session");
            return None;
        }
        self.phase = SessionPhase::Idle;

        let session = self.session.as_mut()?;
        session.end_time = Some(now);
        let session_id = session.id;
        let summary = SessionSummary::from_samples(
            session.id,
            session.start_time,
            now,
            &session.samples,
            session.alert_count,
        );

        match &summary {
            Some(summary) => {
                self.history.record(summary.clone());
                info!(
                    "Session {} stopped: {} readings, {} alerts",
                    session_id, summary.sample_count, summary.total_alerts
                );
            }
            None => info!("Session {} stopped without readings", session_id),
        }

        self.emit(EngineEvent::SessionStopped {
            session_id,
            summary: summary.clone(),
        });
        summary
    }

    pub fn on_sample(&mut self, raw: Option<RawSample>) -> IngestOutcome {
        self.on_sample_at(raw, Utc::now())
    }

    /// Ingress hook for transports and the generator.
    ///
    /// Resolves the timestamp, validates, and ingests if a session is
    /// active. Rejections are logged and never disturb the session; the
    /// boot anchor is only kept for readings the session accepts.
    pub fn on_sample_at(
        &mut self,
        raw: Option<RawSample>,
        received_at: DateTime<Utc>,
    ) -> IngestOutcome {
        let resolved = self
            .clock
            .peek(raw.as_ref().and_then(|r| r.timestamp), received_at);

        match validate(raw.as_ref(), resolved.timestamp) {
            Ok(sample) => match self.ingest_at(sample, received_at) {
                Some(alert) => {
                    self.clock.commit(&resolved);
                    IngestOutcome::Accepted(alert)
                }
                None => IngestOutcome::Idle,
            },
            Err(rejection) => {
                warn!("Dropping sample: {}", rejection);
                IngestOutcome::Rejected(rejection)
            }
        }
    }

    pub fn ingest(&mut self, sample: Sample) -> Option<AlertState> {
        self.ingest_at(sample, Utc::now())
    }

    /// Add a validated reading to the active session.
    ///
    /// Returns `None` (and changes nothing) while idle.
    pub fn ingest_at(&mut self, sample: Sample, now: DateTime<Utc>) -> Option<AlertState> {
        if !self.is_active() {
            debug!("Ignoring sample: no active session");
            return None;
        }
        let session = self.session.as_mut()?;

        let alert = evaluate_alert(
            &sample,
            self.thresholds.alert_threshold_f64(),
            &mut session.alert_count,
        );
        self.window.push(&sample);
        session.samples.push(sample.clone());
        self.stats = compute_stats(
            &session.samples,
            session.start_time,
            now,
            session.alert_count,
        );
        self.latest = Some(sample.clone());
        self.alert_state = alert;

        if let Some(stats) = self.stats {
            let update = DisplayUpdate {
                latest: sample,
                window: self.window.to_vec(),
                alert,
                stats,
                normal_blink_rate: self.thresholds.normal_blink_rate,
            };
            self.emit(EngineEvent::SampleAccepted(update));
        }
        Some(alert)
    }

    /// Readings and statistics of the current (or last stopped) session.
    pub fn export(&self) -> Result<SessionExport<'_>, ExportError> {
        let session = self
            .session
            .as_ref()
            .filter(|s| !s.samples.is_empty())
            .ok_or(ExportError::EmptySession)?;
        let stats = self.stats.ok_or(ExportError::EmptySession)?;

        Ok(SessionExport {
            session_id: session.id,
            start: session.start_time,
            end: session.end_time,
            active: session.is_active(),
            stats,
            samples: &session.samples,
        })
    }

    fn emit(&mut self, event: EngineEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }
}
