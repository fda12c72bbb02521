//! HBOT Session - session countdown host for a hyperbaric therapy companion app
//!
//! This library provides the session progress timer (an authoritative
//! one-second countdown plus a smoothed progress fraction), the debounced
//! username availability check, and a small HTTP host that schedules both.

pub mod config;
pub mod error;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use state::{AppState, SessionTimer, TimerPhase};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
