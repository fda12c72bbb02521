//! Countdown state machine behind the session progress ring
//!
//! The timer owns no scheduling resources. A host calls [`SessionTimer::tick`]
//! once per second and [`SessionTimer::smooth_tick`] at a higher rate while the
//! timer is running, and stops both schedules on pause or finish.

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Lifecycle phase of a session timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Running,
    Paused,
    Finished,
}

impl TimerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
            TimerPhase::Finished => "finished",
        }
    }
}

/// Result of a single authoritative tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// One second was consumed, the session keeps running
    Counted,
    /// The countdown reached zero on this tick
    Finished,
    /// Not running, nothing changed
    Ignored,
}

/// Tuning constants for the display interpolation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    factor: f64,
    epsilon: f64,
}

impl Smoothing {
    pub const DEFAULT_FACTOR: f64 = 0.1;
    pub const DEFAULT_EPSILON: f64 = 0.001;

    pub fn new(factor: f64, epsilon: f64) -> SessionResult<Self> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(SessionError::InvalidSmoothing(format!(
                "factor must be in (0, 1], got {}",
                factor
            )));
        }
        if !(epsilon >= 0.0 && epsilon.is_finite()) {
            return Err(SessionError::InvalidSmoothing(format!(
                "epsilon must be a non-negative number, got {}",
                epsilon
            )));
        }
        Ok(Self { factor, epsilon })
    }

    /// Share of the remaining gap closed per smoothing step, in (0, 1]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Gap (as a fraction) below which the display snaps to the target
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            factor: Self::DEFAULT_FACTOR,
            epsilon: Self::DEFAULT_EPSILON,
        }
    }
}

/// Authoritative countdown plus the smoothed fraction shown by the progress ring
#[derive(Debug, Clone)]
pub struct SessionTimer {
    goal_seconds: u32,
    remaining_seconds: u32,
    display_fraction: f64,
    phase: TimerPhase,
    smoothing: Smoothing,
}

impl SessionTimer {
    /// Create a running timer with the default smoothing constants
    pub fn new(goal_seconds: u32) -> SessionResult<Self> {
        Self::with_smoothing(goal_seconds, Smoothing::default())
    }

    pub fn with_smoothing(goal_seconds: u32, smoothing: Smoothing) -> SessionResult<Self> {
        if goal_seconds == 0 {
            return Err(SessionError::ZeroDuration);
        }

        Ok(Self {
            goal_seconds,
            remaining_seconds: goal_seconds,
            display_fraction: 1.0,
            phase: TimerPhase::Running,
            smoothing,
        })
    }

    /// Consume one second of the countdown
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != TimerPhase::Running {
            return TickOutcome::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = TimerPhase::Finished;
            self.display_fraction = 0.0;
            return TickOutcome::Finished;
        }

        TickOutcome::Counted
    }

    /// Move the displayed fraction one step toward `remaining / goal`
    pub fn smooth_tick(&mut self) {
        if self.phase != TimerPhase::Running {
            return;
        }

        let target = self.target_fraction();
        let gap = self.display_fraction - target;
        if gap.abs() < self.smoothing.epsilon {
            self.display_fraction = target;
        } else {
            self.display_fraction -= gap * self.smoothing.factor;
        }
    }

    /// Returns false when the timer was not running
    pub fn pause(&mut self) -> bool {
        if self.phase != TimerPhase::Running {
            return false;
        }
        self.phase = TimerPhase::Paused;
        true
    }

    /// Returns false when the timer was not paused
    pub fn resume(&mut self) -> bool {
        if self.phase != TimerPhase::Paused {
            return false;
        }
        self.phase = TimerPhase::Running;
        true
    }

    /// Remaining time as `MM:SS`
    pub fn formatted_remaining(&self) -> String {
        format_mm_ss(self.remaining_seconds)
    }

    /// Displayed progress in percent, exactly zero once finished
    pub fn progress_percent(&self) -> f64 {
        if self.phase == TimerPhase::Finished {
            return 0.0;
        }
        (self.display_fraction * 100.0).clamp(0.0, 100.0)
    }

    pub fn goal_seconds(&self) -> u32 {
        self.goal_seconds
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.goal_seconds - self.remaining_seconds
    }

    pub fn display_fraction(&self) -> f64 {
        self.display_fraction
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == TimerPhase::Finished
    }

    fn target_fraction(&self) -> f64 {
        f64::from(self.remaining_seconds) / f64::from(self.goal_seconds)
    }
}

/// Format seconds as zero-padded `MM:SS`
pub fn format_mm_ss(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
