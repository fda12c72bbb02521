//! State management module
//!
//! This module contains the session countdown core and the host state that owns it.

pub mod app_state;
pub mod session_setup;
pub mod session_timer;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, FinishRequest, TimerSettings};
pub use session_setup::SessionSetup;
pub use session_timer::{format_mm_ss, SessionTimer, Smoothing, TickOutcome, TimerPhase};
pub use timer_state::{RunSignal, SessionEvent, SessionSnapshot};
