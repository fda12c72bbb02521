//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::info;

use crate::{
    error::SessionError,
    state::{AppState, FinishRequest, SessionSetup},
};
use super::responses::{
    ApiError, FinishResponse, HealthResponse, SessionResponse, StatusResponse, UsernameInput,
    UsernameResponse,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Handle POST /session - Start a session from the setup flow
pub async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    Json(setup): Json<SessionSetup>,
) -> ApiResult<SessionResponse> {
    let snapshot = state.start_session(setup)?;
    info!("Session endpoint called - session {} started", snapshot.session_id);
    Ok(Json(SessionResponse::snapshot(
        format!("Session started for {}", snapshot.remaining),
        snapshot,
    )))
}

/// Handle GET /session - Current session snapshot
pub async fn get_session_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    let snapshot = state.snapshot()?.ok_or(SessionError::NoSession)?;
    Ok(Json(SessionResponse::snapshot(
        format!("{} remaining", snapshot.remaining),
        snapshot,
    )))
}

/// Handle POST /session/pause
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    let snapshot = state.pause_session()?;
    Ok(Json(SessionResponse::snapshot(
        format!("Session paused at {}", snapshot.remaining),
        snapshot,
    )))
}

/// Handle POST /session/resume
pub async fn resume_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    let snapshot = state.resume_session()?;
    Ok(Json(SessionResponse::snapshot(
        format!("Session resumed at {}", snapshot.remaining),
        snapshot,
    )))
}

/// Handle POST /session/finish - Confirm a finished session and record it
pub async fn finish_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FinishRequest>,
) -> ApiResult<FinishResponse> {
    let summary = state.finish_session(request).await?;
    Ok(Json(FinishResponse::recorded(summary)))
}

/// Handle DELETE /session - Discard the session without recording it
pub async fn discard_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    let session_id = state.discard_session()?;
    Ok(Json(SessionResponse::closed(format!(
        "Session {} discarded",
        session_id
    ))))
}

/// Handle POST /username - Feed the debounced availability check
pub async fn username_input_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<UsernameInput>,
) -> ApiResult<UsernameResponse> {
    let status = state.username_input(&input.value)?;
    Ok(Json(UsernameResponse::new(status.name, status.availability)))
}

/// Handle GET /username - Latest debounced result
pub async fn username_status_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<UsernameResponse> {
    let status = state.username_status()?;
    Ok(Json(UsernameResponse::new(status.name, status.availability)))
}

/// Handle GET /username/:name - Immediate availability check
pub async fn username_check_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<UsernameResponse> {
    let availability = state.check_username(&name).await;
    Json(UsernameResponse::new(name, availability))
}

/// Handle GET /status - Server and session status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let session = state.snapshot()?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        session,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
