//! Collaborators outside the session core
//!
//! The username directory, the finished alert and the session log.

pub mod alert;
pub mod recorder;
pub mod username;

// Re-export main types
pub use alert::{AlertSink, SilentAlert, TerminalBell};
pub use recorder::{JsonlSessionLog, MemoryRecorder, SessionRecorder, SessionSummary};
pub use username::{
    check_now, validate_username, Availability, HttpUsernameDirectory, UsernameCheck,
    UsernameDirectory, UsernameStatus,
};
