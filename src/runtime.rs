//! Event loop driving the session engine.
//!
//! Transports push [`MonitorEvent`]s into a channel from their own threads.
//! The loop drains the channel on a single thread and runs every handler
//! to completion: sample delivery, start/stop commands, connectivity
//! changes and generator ticks never overlap, so the engine needs no locks.

use crate::core::engine::{EngineError, IngestOutcome, SessionEngine};
use crate::core::summary::SessionSummary;
use crate::telemetry::simulator::Simulator;
use crate::telemetry::types::{ConnectionStatus, RawSample};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Longest the loop waits for an event before doing housekeeping.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// How often the housekeeping callback runs.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(1);

/// Commands originating from a user surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCommand {
    StartSession,
    StopSession,
}

/// Everything that can arrive on the monitor's channel.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A decoded reading; `None` when the transport delivered an empty message
    Sample(Option<RawSample>),
    Command(MonitorCommand),
    Connectivity(ConnectionStatus),
}

/// Shortest generator period; a zero interval would fire on every loop pass.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-period schedule for the generator.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Instant,
}

impl Ticker {
    pub fn new(interval: Duration, now: Instant) -> Self {
        let interval = interval.max(MIN_TICK_INTERVAL);
        Self {
            interval,
            next_due: now + interval,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    pub fn time_until_due(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// Move to the next period. Missed periods are skipped, not replayed.
    fn advance(&mut self, now: Instant) {
        self.next_due += self.interval;
        if self.next_due <= now {
            self.next_due = now + self.interval;
        }
    }
}

/// Owns the engine plus the optional generator and its ticker slot.
pub struct Monitor {
    engine: SessionEngine,
    simulator: Option<Simulator>,
    tick_interval: Duration,
    ticker: Option<Ticker>,
    connection: Option<ConnectionStatus>,
    on_stop: Option<Box<dyn FnMut(&SessionEngine)>>,
}

impl Monitor {
    pub fn new(engine: SessionEngine) -> Self {
        Self {
            engine,
            simulator: None,
            tick_interval: Duration::from_secs(2),
            ticker: None,
            connection: None,
            on_stop: None,
        }
    }

    /// Feed sessions from `simulator`, one reading per `tick_interval`.
    pub fn with_simulator(mut self, simulator: Simulator, tick_interval: Duration) -> Self {
        self.simulator = Some(simulator);
        self.tick_interval = tick_interval;
        self
    }

    /// Run `hook` each time an active session stops, whatever stopped it.
    ///
    /// The engine still holds the stopped session, so the hook can export it
    /// before a later start replaces it.
    pub fn with_stop_hook(mut self, hook: impl FnMut(&SessionEngine) + 'static) -> Self {
        self.on_stop = Some(Box::new(hook));
        self
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SessionEngine {
        &mut self.engine
    }

    /// Whether a generator tick is currently scheduled.
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// Last connectivity status reported by a transport.
    pub fn connection(&self) -> Option<ConnectionStatus> {
        self.connection
    }

    pub fn start_session(&mut self) -> Result<Uuid, EngineError> {
        self.start_session_at(Instant::now(), Utc::now())
    }

    /// Start a session and, in generator mode, arm a fresh ticker.
    ///
    /// The ticker lives in a single slot, so a restart replaces rather
    /// than adds a schedule.
    pub fn start_session_at(
        &mut self,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Result<Uuid, EngineError> {
        let session_id = self.engine.start_at(wall)?;
        if let Some(simulator) = self.simulator.as_mut() {
            simulator.reset(wall);
            self.ticker = Some(Ticker::new(self.tick_interval, now));
            debug!("Generator armed every {:?}", self.tick_interval);
        }
        Ok(session_id)
    }

    pub fn stop_session(&mut self) -> Option<SessionSummary> {
        self.stop_session_at(Utc::now())
    }

    /// Cancel any pending tick, then stop the engine. Safe to repeat.
    pub fn stop_session_at(&mut self, wall: DateTime<Utc>) -> Option<SessionSummary> {
        if self.ticker.take().is_some() {
            debug!("Generator cancelled");
        }
        if !self.engine.is_active() {
            return None;
        }

        let summary = self.engine.stop_at(wall);
        if let Some(hook) = self.on_stop.as_mut() {
            hook(&self.engine);
        }
        summary
    }

    /// Handle one event from the channel.
    pub fn handle(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Sample(raw) => {
                self.engine.on_sample(raw);
            }
            MonitorEvent::Command(MonitorCommand::StartSession) => {
                if let Err(e) = self.start_session() {
                    warn!("Start command ignored: {}", e);
                }
            }
            MonitorEvent::Command(MonitorCommand::StopSession) => {
                self.stop_session();
            }
            MonitorEvent::Connectivity(status) => {
                if self.connection != Some(status) {
                    match status {
                        ConnectionStatus::Connected => info!("Transport connected"),
                        ConnectionStatus::Disconnected => warn!("Transport disconnected"),
                    }
                }
                self.connection = Some(status);
            }
        }
    }

    pub fn poll_tick(&mut self, now: Instant) -> Option<IngestOutcome> {
        self.poll_tick_at(now, Utc::now())
    }

    /// Run the generator if its tick is due.
    pub fn poll_tick_at(&mut self, now: Instant, wall: DateTime<Utc>) -> Option<IngestOutcome> {
        let ticker = self.ticker.as_mut()?;
        if !ticker.is_due(now) {
            return None;
        }
        ticker.advance(now);

        let simulator = self.simulator.as_mut()?;
        let threshold = self.engine.thresholds().alert_threshold_f64();
        let reading = simulator.tick(wall, threshold);
        Some(self.engine.on_sample_at(Some(reading.raw), wall))
    }

    /// Process events until `running` clears or every sender is gone.
    ///
    /// `housekeeping` runs about once a second on the loop thread. The
    /// active session is stopped before returning.
    pub fn run<F>(&mut self, receiver: &Receiver<MonitorEvent>, running: &AtomicBool, mut housekeeping: F)
    where
        F: FnMut(&mut Monitor),
    {
        let mut last_housekeeping = Instant::now();

        while running.load(Ordering::SeqCst) {
            if last_housekeeping.elapsed() >= HOUSEKEEPING_INTERVAL {
                housekeeping(self);
                last_housekeeping = Instant::now();
            }

            let timeout = self
                .ticker
                .as_ref()
                .map(|t| t.time_until_due(Instant::now()).min(POLL_TIMEOUT))
                .unwrap_or(POLL_TIMEOUT);

            match receiver.recv_timeout(timeout) {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if self.ticker.is_none() {
                        info!("All transports closed");
                        break;
                    }
                    std::thread::sleep(timeout);
                }
            }

            self.poll_tick(Instant::now());
        }

        self.stop_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::history::HistoryStore;
    use crate::telemetry::types::HeadMovement;
    use chrono::Duration as ChronoDuration;
    use std::cell::RefCell;
    use std::rc::Rc;

    const TICK: Duration = Duration::from_secs(2);

    fn monitor() -> Monitor {
        let engine = SessionEngine::new(Thresholds::default(), HistoryStore::in_memory());
        Monitor::new(engine).with_simulator(Simulator::with_seed(42), TICK)
    }

    fn raw() -> RawSample {
        RawSample {
            eye_blink_rate: Some(16.0),
            head_movement: Some(HeadMovement::default()),
            drowsiness_level: Some(30.0),
            alert_triggered: Some(false),
            ..RawSample::default()
        }
    }

    #[test]
    fn test_ticker_skips_missed_periods() {
        let start = Instant::now();
        let mut ticker = Ticker::new(TICK, start);
        assert!(!ticker.is_due(start));
        assert!(ticker.is_due(start + TICK));

        ticker.advance(start + TICK * 5);
        assert_eq!(ticker.time_until_due(start + TICK * 5), TICK);
    }

    #[test]
    fn test_generator_ticks_only_while_active() {
        let mut monitor = monitor();
        let now = Instant::now();
        let wall = Utc::now();

        assert!(monitor.poll_tick_at(now + TICK, wall).is_none());

        monitor.start_session_at(now, wall).unwrap();
        assert!(monitor.is_ticking());
        assert!(monitor.poll_tick_at(now + TICK / 2, wall).is_none());

        for i in 1..=5u32 {
            let outcome = monitor.poll_tick_at(
                now + TICK * i,
                wall + ChronoDuration::seconds(2 * i as i64),
            );
            assert!(matches!(outcome, Some(IngestOutcome::Accepted(_))));
        }
        assert_eq!(monitor.engine().session().unwrap().samples.len(), 5);

        let summary = monitor.stop_session().unwrap();
        assert_eq!(summary.sample_count, 5);
        assert!(!monitor.is_ticking());
        assert!(monitor.poll_tick_at(now + TICK * 6, wall).is_none());
    }

    #[test]
    fn test_restart_does_not_double_schedule() {
        let mut monitor = monitor();
        let now = Instant::now();
        let wall = Utc::now();

        monitor.start_session_at(now, wall).unwrap();
        monitor.stop_session();
        monitor.stop_session();
        monitor.start_session_at(now, wall).unwrap();

        // Exactly one tick per period after a restart
        assert!(monitor.poll_tick_at(now + TICK, wall).is_some());
        assert!(monitor.poll_tick_at(now + TICK, wall).is_none());
        assert_eq!(monitor.engine().session().unwrap().samples.len(), 1);
        assert_eq!(monitor.engine().history().load().len(), 0);
    }

    #[test]
    fn test_commands_and_connectivity() {
        let engine = SessionEngine::new(Thresholds::default(), HistoryStore::in_memory());
        let mut monitor = Monitor::new(engine);

        monitor.handle(MonitorEvent::Command(MonitorCommand::StartSession));
        monitor.handle(MonitorEvent::Sample(Some(raw())));
        monitor.handle(MonitorEvent::Connectivity(ConnectionStatus::Disconnected));

        // Disconnect leaves the session alone
        assert!(monitor.engine().is_active());
        assert_eq!(monitor.connection(), Some(ConnectionStatus::Disconnected));
        assert!(!monitor.is_ticking());

        monitor.handle(MonitorEvent::Command(MonitorCommand::StopSession));
        assert!(!monitor.engine().is_active());
        assert_eq!(monitor.engine().history().load().len(), 1);
    }

    #[test]
    fn test_run_stops_session_when_senders_close() {
        let engine = SessionEngine::new(Thresholds::default(), HistoryStore::in_memory());
        let mut monitor = Monitor::new(engine);
        monitor.start_session().unwrap();

        let (sender, receiver) = crossbeam_channel::unbounded();
        for _ in 0..3 {
            sender.send(MonitorEvent::Sample(Some(raw()))).unwrap();
        }
        sender.send(MonitorEvent::Sample(None)).unwrap();
        drop(sender);

        let running = AtomicBool::new(true);
        monitor.run(&receiver, &running, |_| {});

        assert!(!monitor.engine().is_active());
        let history = monitor.engine().history().load();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sample_count, 3);
    }

    #[test]
    fn test_zero_interval_is_floored() {
        let start = Instant::now();
        let ticker = Ticker::new(Duration::ZERO, start);
        assert!(!ticker.is_due(start));
        assert_eq!(ticker.time_until_due(start), MIN_TICK_INTERVAL);

        let mut monitor = Monitor::new(SessionEngine::new(
            Thresholds::default(),
            HistoryStore::in_memory(),
        ))
        .with_simulator(Simulator::with_seed(1), Duration::ZERO);
        let wall = Utc::now();
        monitor.start_session_at(start, wall).unwrap();

        assert!(monitor.poll_tick_at(start, wall).is_none());
        assert!(monitor.poll_tick_at(start + MIN_TICK_INTERVAL, wall).is_some());
        assert!(monitor.poll_tick_at(start + MIN_TICK_INTERVAL, wall).is_none());
    }

    #[test]
    fn test_stop_hook_sees_each_stopped_session() {
        let exported = Rc::new(RefCell::new(Vec::new()));
        let sink = exported.clone();

        let engine = SessionEngine::new(Thresholds::default(), HistoryStore::in_memory());
        let mut monitor = Monitor::new(engine).with_stop_hook(move |engine: &SessionEngine| {
            let count = engine.export().map(|e| e.samples.len()).unwrap_or(0);
            sink.borrow_mut().push(count);
        });

        monitor.handle(MonitorEvent::Command(MonitorCommand::StartSession));
        monitor.handle(MonitorEvent::Sample(Some(raw())));
        monitor.handle(MonitorEvent::Sample(Some(raw())));
        monitor.handle(MonitorEvent::Command(MonitorCommand::StopSession));
        monitor.handle(MonitorEvent::Command(MonitorCommand::StopSession));

        monitor.handle(MonitorEvent::Command(MonitorCommand::StartSession));
        monitor.handle(MonitorEvent::Sample(Some(raw())));
        monitor.stop_session();

        assert_eq!(*exported.borrow(), vec![2, 1]);
    }
}
