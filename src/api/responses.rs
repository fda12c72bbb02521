//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{
    error::SessionError,
    services::{Availability, SessionSummary},
    state::SessionSnapshot,
};

/// Response for session lifecycle endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub session: Option<SessionSnapshot>,
}

impl SessionResponse {
    pub fn new(status: &str, message: String, session: Option<SessionSnapshot>) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            session,
        }
    }

    pub fn snapshot(message: String, snapshot: SessionSnapshot) -> Self {
        let status = snapshot.phase.as_str();
        Self::new(status, message, Some(snapshot))
    }

    pub fn closed(message: String) -> Self {
        Self::new("closed", message, None)
    }
}

/// Response for a confirmed session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub summary: SessionSummary,
}

impl FinishResponse {
    pub fn recorded(summary: SessionSummary) -> Self {
        Self {
            status: "recorded".to_string(),
            timestamp: Utc::now(),
            summary,
        }
    }
}

/// Body of `POST /username`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameInput {
    #[serde(default)]
    pub value: String,
}

/// Availability answer for a single name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameResponse {
    pub name: String,
    pub availability: Availability,
    pub settled: bool,
    pub timestamp: DateTime<Utc>,
}

impl UsernameResponse {
    pub fn new(name: String, availability: Availability) -> Self {
        Self {
            name,
            settled: availability.is_settled(),
            availability,
            timestamp: Utc::now(),
        }
    }
}

/// Status response with session and server information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub session: Option<SessionSnapshot>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Session errors rendered as HTTP responses
#[derive(Debug)]
pub struct ApiError(pub SessionError);

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            SessionError::ZeroDuration
            | SessionError::InvalidSetup(_)
            | SessionError::InvalidSmoothing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::SessionActive(_)
            | SessionError::InvalidTransition { .. }
            | SessionError::NotFinished(_)
            | SessionError::FinishInProgress(_) => StatusCode::CONFLICT,
            SessionError::NoSession => StatusCode::NOT_FOUND,
            SessionError::Recorder(_) => StatusCode::BAD_GATEWAY,
            SessionError::LockPoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.0.to_string(),
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
