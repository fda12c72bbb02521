//! Published views of the active session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session_timer::{SessionTimer, TimerPhase};

/// Serializable snapshot of the active session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: u64,
    pub phase: TimerPhase,
    pub goal_seconds: u32,
    pub remaining_seconds: u32,
    pub remaining: String,
    pub progress_percent: f64,
    pub display_fraction: f64,
    pub started_at: DateTime<Utc>,
    pub can_finish: bool,
}

impl SessionSnapshot {
    pub fn capture(session_id: u64, timer: &SessionTimer, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            phase: timer.phase(),
            goal_seconds: timer.goal_seconds(),
            remaining_seconds: timer.remaining_seconds(),
            remaining: timer.formatted_remaining(),
            progress_percent: timer.progress_percent(),
            display_fraction: timer.display_fraction(),
            started_at,
            can_finish: timer.is_finished(),
        }
    }
}

/// Instruction for the host scheduler
///
/// The scheduler keeps both intervals alive only while the current signal is
/// running. Any change to the signal, including a bumped epoch on resume,
/// drops them and starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSignal {
    pub session_id: Option<u64>,
    pub epoch: u64,
    pub running: bool,
}

impl RunSignal {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn run(session_id: u64, epoch: u64) -> Self {
        Self {
            session_id: Some(session_id),
            epoch,
            running: true,
        }
    }

    pub fn stop(session_id: Option<u64>, epoch: u64) -> Self {
        Self {
            session_id,
            epoch,
            running: false,
        }
    }

    /// Session id to drive, if the scheduler should be ticking
    pub fn active_session(&self) -> Option<u64> {
        if self.running {
            self.session_id
        } else {
            None
        }
    }
}

/// Lifecycle notifications broadcast to background tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { session_id: u64, goal_seconds: u32 },
    Paused { session_id: u64 },
    Resumed { session_id: u64 },
    Finished { session_id: u64, goal_seconds: u32 },
    Recorded { session_id: u64 },
    Discarded { session_id: u64 },
}
