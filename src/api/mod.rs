//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/session",
            post(start_session_handler)
                .get(get_session_handler)
                .delete(discard_handler),
        )
        .route("/session/pause", post(pause_handler))
        .route("/session/resume", post(resume_handler))
        .route("/session/finish", post(finish_handler))
        .route(
            "/username",
            post(username_input_handler).get(username_status_handler),
        )
        .route("/username/:name", get(username_check_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
