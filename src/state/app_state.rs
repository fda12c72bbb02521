//! Host-side ownership of the active session

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use super::{
    RunSignal, SessionEvent, SessionSetup, SessionSnapshot, SessionTimer, Smoothing, TickOutcome,
};
use crate::{
    error::{SessionError, SessionResult},
    services::{
        check_now, Availability, SessionRecorder, SessionSummary, UsernameCheck,
        UsernameDirectory, UsernameStatus,
    },
};

/// Scheduling periods and smoothing constants for hosted sessions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSettings {
    pub tick_interval: Duration,
    pub smooth_interval: Duration,
    pub smoothing: Smoothing,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            smooth_interval: Duration::from_millis(100),
            smoothing: Smoothing::default(),
        }
    }
}

/// Details supplied when the user confirms a finished session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishRequest {
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug)]
struct ActiveSession {
    id: u64,
    timer: SessionTimer,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    epoch: u64,
    /// Set while the summary is being handed to the recorder
    finishing: bool,
}

impl ActiveSession {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self.id, &self.timer, self.started_at)
    }
}

/// Main application state: at most one session plus the username checker
pub struct AppState {
    pub settings: TimerSettings,
    session: Mutex<Option<ActiveSession>>,
    next_session_id: AtomicU64,
    recorder: Arc<dyn SessionRecorder>,
    directory: Arc<dyn UsernameDirectory>,
    username_check: Mutex<UsernameCheck>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    last_action: Mutex<Option<String>>,
    last_action_time: Mutex<Option<DateTime<Utc>>>,
    /// Lifecycle notifications (finish alert, logging)
    pub event_tx: broadcast::Sender<SessionEvent>,
    /// Latest session snapshot, `None` when no session is held
    pub snapshot_tx: watch::Sender<Option<SessionSnapshot>>,
    /// Tells the scheduler whether to drive the intervals
    pub run_tx: watch::Sender<RunSignal>,
}

impl AppState {
    pub fn new(
        host: String,
        port: u16,
        settings: TimerSettings,
        recorder: Arc<dyn SessionRecorder>,
        directory: Arc<dyn UsernameDirectory>,
        username_debounce: Duration,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let (snapshot_tx, _) = watch::channel(None);
        let (run_tx, _) = watch::channel(RunSignal::idle());
        let username_check = UsernameCheck::new(Arc::clone(&directory), username_debounce);

        Self {
            settings,
            session: Mutex::new(None),
            next_session_id: AtomicU64::new(0),
            recorder,
            directory,
            username_check: Mutex::new(username_check),
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
            event_tx,
            snapshot_tx,
            run_tx,
        }
    }

    /// Start a new session from the setup flow
    ///
    /// Every mutation publishes its snapshot, run signal and event while the
    /// session lock is held, so the channels always follow lock order.
    pub fn start_session(&self, setup: SessionSetup) -> SessionResult<SessionSnapshot> {
        let goal_seconds = setup.goal_seconds()?;
        let timer = SessionTimer::with_smoothing(goal_seconds, self.settings.smoothing)?;

        let mut slot = self.lock_session()?;
        if let Some(existing) = slot.as_ref() {
            return Err(SessionError::SessionActive(existing.id));
        }

        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session = ActiveSession {
            id,
            timer,
            started_at: Utc::now(),
            finished_at: None,
            epoch: 0,
            finishing: false,
        };
        let snapshot = session.snapshot();
        *slot = Some(session);
        self.publish(Some(snapshot.clone()), RunSignal::run(id, 0));
        self.notify(SessionEvent::Started { session_id: id, goal_seconds });
        drop(slot);

        info!("Started session {} for {}", id, snapshot.remaining);
        self.record_action("start");
        Ok(snapshot)
    }

    pub fn pause_session(&self) -> SessionResult<SessionSnapshot> {
        let mut slot = self.lock_session()?;
        let session = slot.as_mut().ok_or(SessionError::NoSession)?;
        if !session.timer.pause() {
            return Err(SessionError::InvalidTransition {
                action: "pause",
                phase: session.timer.phase().as_str(),
            });
        }
        let id = session.id;
        let snapshot = session.snapshot();
        self.publish(Some(snapshot.clone()), RunSignal::stop(Some(id), session.epoch));
        self.notify(SessionEvent::Paused { session_id: id });
        drop(slot);

        info!("Paused session {} at {}", id, snapshot.remaining);
        self.record_action("pause");
        Ok(snapshot)
    }

    pub fn resume_session(&self) -> SessionResult<SessionSnapshot> {
        let mut slot = self.lock_session()?;
        let session = slot.as_mut().ok_or(SessionError::NoSession)?;
        if !session.timer.resume() {
            return Err(SessionError::InvalidTransition {
                action: "resume",
                phase: session.timer.phase().as_str(),
            });
        }
        session.epoch += 1;
        let id = session.id;
        let snapshot = session.snapshot();
        self.publish(Some(snapshot.clone()), RunSignal::run(id, session.epoch));
        self.notify(SessionEvent::Resumed { session_id: id });
        drop(slot);

        info!("Resumed session {} at {}", id, snapshot.remaining);
        self.record_action("resume");
        Ok(snapshot)
    }

    /// One-second tick from the scheduler; stale ids are ignored
    pub fn tick_session(&self, session_id: u64) -> SessionResult<TickOutcome> {
        let mut slot = self.lock_session()?;
        let Some(session) = slot.as_mut().filter(|s| s.id == session_id) else {
            return Ok(TickOutcome::Ignored);
        };

        let outcome = session.timer.tick();
        match outcome {
            TickOutcome::Ignored => return Ok(outcome),
            TickOutcome::Counted => {
                self.snapshot_tx.send_replace(Some(session.snapshot()));
            }
            TickOutcome::Finished => {
                session.finished_at = Some(Utc::now());
                let goal_seconds = session.timer.goal_seconds();
                self.publish(
                    Some(session.snapshot()),
                    RunSignal::stop(Some(session_id), session.epoch),
                );
                self.notify(SessionEvent::Finished {
                    session_id,
                    goal_seconds,
                });
                drop(slot);
                info!("Session {} finished after {}s", session_id, goal_seconds);
            }
        }
        Ok(outcome)
    }

    /// Smoothing step from the scheduler; stale ids are ignored
    pub fn smooth_session(&self, session_id: u64) -> SessionResult<()> {
        let mut slot = self.lock_session()?;
        let Some(session) = slot.as_mut().filter(|s| s.id == session_id) else {
            return Ok(());
        };

        session.timer.smooth_tick();
        self.snapshot_tx.send_replace(Some(session.snapshot()));
        Ok(())
    }

    /// Confirm a finished session and hand its summary to the recorder
    ///
    /// The session is marked as finishing before the recorder runs, so a
    /// second confirmation is rejected instead of recording twice. A failed
    /// recording clears the mark and leaves the session in place for a retry.
    pub async fn finish_session(&self, request: FinishRequest) -> SessionResult<SessionSummary> {
        let summary = {
            let mut slot = self.lock_session()?;
            let session = slot.as_mut().ok_or(SessionError::NoSession)?;
            if !session.timer.is_finished() {
                return Err(SessionError::NotFinished(session.id));
            }
            if session.finishing {
                return Err(SessionError::FinishInProgress(session.id));
            }
            session.finishing = true;
            SessionSummary {
                session_id: session.id,
                mood: request.mood,
                protocol: request.protocol,
                notes: request.notes,
                duration_seconds: session.timer.elapsed_seconds(),
                started_at: session.started_at,
                finished_at: session.finished_at.unwrap_or_else(Utc::now),
            }
        };
        let session_id = summary.session_id;

        if let Err(e) = self.recorder.record(&summary).await {
            let mut slot = self.lock_session()?;
            if let Some(session) = slot.as_mut().filter(|s| s.id == session_id) {
                session.finishing = false;
            }
            return Err(e.into());
        }

        let mut slot = self.lock_session()?;
        if slot.as_ref().is_some_and(|s| s.id == session_id) {
            *slot = None;
            self.publish(None, RunSignal::idle());
        }
        self.notify(SessionEvent::Recorded { session_id });
        drop(slot);

        info!("Session {} confirmed and recorded", session_id);
        self.record_action("finish");
        Ok(summary)
    }

    /// Drop the held session without recording it
    pub fn discard_session(&self) -> SessionResult<u64> {
        let mut slot = self.lock_session()?;
        let session = slot.take().ok_or(SessionError::NoSession)?;
        self.publish(None, RunSignal::idle());
        self.notify(SessionEvent::Discarded {
            session_id: session.id,
        });
        drop(slot);

        info!(
            "Discarded session {} ({} remaining)",
            session.id,
            session.timer.formatted_remaining()
        );
        self.record_action("discard");
        Ok(session.id)
    }

    /// Current snapshot of the held session, if any
    pub fn snapshot(&self) -> SessionResult<Option<SessionSnapshot>> {
        Ok(self.lock_session()?.as_ref().map(ActiveSession::snapshot))
    }

    /// Feed a keystroke from the username field into the debounced checker
    pub fn username_input(&self, value: &str) -> SessionResult<UsernameStatus> {
        let mut check = self
            .username_check
            .lock()
            .map_err(|_| SessionError::LockPoisoned("username check"))?;
        check.input(value);
        Ok(check.latest())
    }

    pub fn username_status(&self) -> SessionResult<UsernameStatus> {
        self.username_check
            .lock()
            .map(|check| check.latest())
            .map_err(|_| SessionError::LockPoisoned("username check"))
    }

    pub fn subscribe_username(&self) -> SessionResult<watch::Receiver<UsernameStatus>> {
        self.username_check
            .lock()
            .map(|check| check.subscribe())
            .map_err(|_| SessionError::LockPoisoned("username check"))
    }

    /// Check a username right away, bypassing the debounce
    pub async fn check_username(&self, name: &str) -> Availability {
        check_now(self.directory.as_ref(), name).await
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    fn lock_session(&self) -> SessionResult<MutexGuard<'_, Option<ActiveSession>>> {
        self.session
            .lock()
            .map_err(|_| SessionError::LockPoisoned("session state"))
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    fn publish(&self, snapshot: Option<SessionSnapshot>, signal: RunSignal) {
        self.snapshot_tx.send_replace(snapshot);
        self.run_tx.send_replace(signal);
    }

    fn notify(&self, event: SessionEvent) {
        if let Err(e) = self.event_tx.send(event) {
            debug!("No listeners for session event: {:?}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecorderError;
    use crate::services::{username::DirectoryError, MemoryRecorder};
    use crate::state::TimerPhase;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    struct EverythingFree;

    #[async_trait]
    impl UsernameDirectory for EverythingFree {
        async fn lookup(&self, _name: &str) -> Result<u16, DirectoryError> {
            Ok(404)
        }
    }

    /// Records into memory after a delay, optionally failing the first call
    struct SlowRecorder {
        inner: MemoryRecorder,
        fail_next: AtomicBool,
    }

    impl SlowRecorder {
        fn new(fail_first: bool) -> Self {
            Self {
                inner: MemoryRecorder::new(),
                fail_next: AtomicBool::new(fail_first),
            }
        }
    }

    #[async_trait]
    impl SessionRecorder for SlowRecorder {
        async fn record(&self, summary: &SessionSummary) -> Result<(), RecorderError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(RecorderError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.record(summary).await
        }
    }

    fn app_state(recorder: Arc<dyn SessionRecorder>) -> AppState {
        AppState::new(
            "127.0.0.1".to_string(),
            0,
            TimerSettings::default(),
            recorder,
            Arc::new(EverythingFree),
            Duration::from_millis(350),
        )
    }

    #[test]
    fn start_publishes_running_signal() {
        let state = app_state(Arc::new(MemoryRecorder::new()));
        let snapshot = state.start_session(SessionSetup::new(1, 30)).unwrap();

        assert_eq!(snapshot.goal_seconds, 90);
        assert_eq!(snapshot.remaining, "01:30");
        assert_eq!(snapshot.phase, TimerPhase::Running);
        assert_eq!(state.run_tx.borrow().active_session(), Some(snapshot.session_id));
        assert_eq!(*state.snapshot_tx.borrow(), Some(snapshot));
    }

    #[test]
    fn rejects_zero_and_out_of_range_setups() {
        let state = app_state(Arc::new(MemoryRecorder::new()));
        assert!(matches!(
            state.start_session(SessionSetup::new(0, 0)),
            Err(SessionError::ZeroDuration)
        ));
        assert!(matches!(
            state.start_session(SessionSetup::new(0, 60)),
            Err(SessionError::InvalidSetup(_))
        ));
        assert!(state.snapshot().unwrap().is_none());
    }

    #[test]
    fn only_one_session_at_a_time() {
        let state = app_state(Arc::new(MemoryRecorder::new()));
        let first = state.start_session(SessionSetup::new(1, 0)).unwrap();
        assert!(matches!(
            state.start_session(SessionSetup::new(2, 0)),
            Err(SessionError::SessionActive(id)) if id == first.session_id
        ));
    }

    #[test]
    fn pause_and_resume_drive_run_signal() {
        let state = app_state(Arc::new(MemoryRecorder::new()));
        let id = state.start_session(SessionSetup::new(1, 0)).unwrap().session_id;

        state.pause_session().unwrap();
        assert_eq!(state.run_tx.borrow().active_session(), None);
        assert!(matches!(
            state.pause_session(),
            Err(SessionError::InvalidTransition { action: "pause", phase: "paused" })
        ));

        let before = *state.run_tx.borrow();
        state.resume_session().unwrap();
        let after = *state.run_tx.borrow();
        assert_eq!(after.active_session(), Some(id));
        assert!(after.epoch > before.epoch);
        assert!(matches!(
            state.resume_session(),
            Err(SessionError::InvalidTransition { action: "resume", .. })
        ));
    }

    #[test]
    fn ticks_for_other_sessions_are_ignored() {
        let state = app_state(Arc::new(MemoryRecorder::new()));
        let id = state.start_session(SessionSetup::new(0, 10)).unwrap().session_id;

        assert_eq!(state.tick_session(id + 1).unwrap(), TickOutcome::Ignored);
        assert_eq!(state.tick_session(id).unwrap(), TickOutcome::Counted);
        assert_eq!(state.snapshot().unwrap().unwrap().remaining_seconds, 9);
    }

    #[tokio::test]
    async fn finishing_requires_finished_phase_then_records() {
        let recorder = Arc::new(MemoryRecorder::new());
        let state = app_state(recorder.clone());
        let mut events = state.event_tx.subscribe();
        let id = state.start_session(SessionSetup::new(0, 3)).unwrap().session_id;

        assert!(matches!(
            state.finish_session(FinishRequest::default()).await,
            Err(SessionError::NotFinished(_))
        ));

        for _ in 0..3 {
            state.tick_session(id).unwrap();
        }
        let snapshot = state.snapshot().unwrap().unwrap();
        assert!(snapshot.can_finish);
        assert_eq!(snapshot.progress_percent, 0.0);
        assert!(!state.run_tx.borrow().running);

        let summary = state
            .finish_session(FinishRequest {
                mood: Some("relaxed".to_string()),
                protocol: Some("2.0 ATA".to_string()),
                notes: None,
            })
            .await
            .unwrap();
        assert_eq!(summary.duration_seconds, 3);
        assert_eq!(recorder.summaries(), vec![summary]);
        assert!(state.snapshot().unwrap().is_none());

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                SessionEvent::Started { session_id: id, goal_seconds: 3 },
                SessionEvent::Finished { session_id: id, goal_seconds: 3 },
                SessionEvent::Recorded { session_id: id },
            ]
        );
    }

    #[test]
    fn discard_releases_the_slot() {
        let state = app_state(Arc::new(MemoryRecorder::new()));
        assert!(matches!(state.discard_session(), Err(SessionError::NoSession)));

        let id = state.start_session(SessionSetup::new(5, 0)).unwrap().session_id;
        assert_eq!(state.discard_session().unwrap(), id);
        assert_eq!(*state.run_tx.borrow(), RunSignal::idle());
        assert!(state.start_session(SessionSetup::new(5, 0)).is_ok());
    }

    #[tokio::test]
    async fn last_action_is_tracked() {
        let state = app_state(Arc::new(MemoryRecorder::new()));
        assert_eq!(state.get_last_action(), (None, None));
        state.start_session(SessionSetup::new(1, 0)).unwrap();
        state.pause_session().unwrap();
        let (action, time) = state.get_last_action();
        assert_eq!(action.as_deref(), Some("pause"));
        assert!(time.is_some());
        assert_eq!(state.check_username("diver01").await, Availability::Available);
    }

    fn finished_session(state: &AppState, seconds: u32) -> u64 {
        let id = state.start_session(SessionSetup::new(0, seconds)).unwrap().session_id;
        for _ in 0..seconds {
            state.tick_session(id).unwrap();
        }
        id
    }

    #[test]
    fn concurrent_pause_and_resume_leave_running_session_scheduled() {
        for _ in 0..2_000 {
            let state = app_state(Arc::new(MemoryRecorder::new()));
            let id = state.start_session(SessionSetup::new(10, 0)).unwrap().session_id;

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    state.pause_session().unwrap();
                });
                scope.spawn(|| {
                    while state.resume_session().is_err() {
                        std::thread::yield_now();
                    }
                });
            });

            let snapshot = state.snapshot().unwrap().unwrap();
            assert_eq!(snapshot.phase, TimerPhase::Running);
            assert_eq!(state.run_tx.borrow().active_session(), Some(id));
            assert_eq!(*state.snapshot_tx.borrow(), Some(snapshot));
        }
    }

    #[test]
    fn concurrent_ticks_never_overwrite_a_paused_snapshot() {
        for _ in 0..500 {
            let state = app_state(Arc::new(MemoryRecorder::new()));
            let id = state.start_session(SessionSetup::new(30, 0)).unwrap().session_id;

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for _ in 0..20 {
                        state.tick_session(id).unwrap();
                        state.smooth_session(id).unwrap();
                    }
                });
                scope.spawn(|| {
                    state.pause_session().unwrap();
                });
            });

            let published = state.snapshot_tx.borrow().clone().unwrap();
            assert_eq!(published.phase, TimerPhase::Paused);
            assert_eq!(Some(published), state.snapshot().unwrap());
            assert!(!state.run_tx.borrow().running);
        }
    }

    #[tokio::test]
    async fn double_confirmation_records_once() {
        let recorder = Arc::new(SlowRecorder::new(false));
        let state = app_state(recorder.clone());
        let id = finished_session(&state, 2);

        let (first, second) = tokio::join!(
            state.finish_session(FinishRequest::default()),
            state.finish_session(FinishRequest::default()),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(SessionError::FinishInProgress(s)) if *s == id)));
        assert_eq!(recorder.inner.summaries().len(), 1);
        assert!(state.snapshot().unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_recording_can_be_retried() {
        let recorder = Arc::new(SlowRecorder::new(true));
        let state = app_state(recorder.clone());
        let id = finished_session(&state, 1);

        assert!(matches!(
            state.finish_session(FinishRequest::default()).await,
            Err(SessionError::Recorder(_))
        ));
        let held = state.snapshot().unwrap().unwrap();
        assert_eq!(held.session_id, id);
        assert!(held.can_finish);

        let summary = state.finish_session(FinishRequest::default()).await.unwrap();
        assert_eq!(summary.session_id, id);
        assert_eq!(recorder.inner.summaries(), vec![summary]);
    }

    #[tokio::test(start_paused = true)]
    async fn username_subscribers_see_debounced_result() {
        let state = app_state(Arc::new(MemoryRecorder::new()));
        let mut rx = state.subscribe_username().unwrap();

        state.username_input("diver01").unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().availability, Availability::Checking);

        rx.changed().await.unwrap();
        let status = rx.borrow_and_update().clone();
        assert_eq!(status.name, "diver01");
        assert_eq!(status.availability, Availability::Available);
    }
}
