//! Error types shared across the session host

use thiserror::Error;

/// Errors raised by session lifecycle operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session duration must be at least one second")]
    ZeroDuration,

    #[error("Invalid session setup: {0}")]
    InvalidSetup(String),

    #[error("Invalid smoothing: {0}")]
    InvalidSmoothing(String),

    #[error("A session is already in progress (id {0})")]
    SessionActive(u64),

    #[error("No session in progress")]
    NoSession,

    #[error("Cannot {action} a session that is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("Session {0} has not finished yet")]
    NotFinished(u64),

    #[error("Session {0} is already being recorded")]
    FinishInProgress(u64),

    #[error("Failed to record session: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Failed to lock {0}")]
    LockPoisoned(&'static str),
}

/// Errors raised while persisting a finished session
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while turning CLI options into runtime settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} period must be greater than zero")]
    ZeroPeriod(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type SessionResult<T> = Result<T, SessionError>;
