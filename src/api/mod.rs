//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tasks", put(set_tasks_handler))
        .route("/tasks/:task_id/start", post(start_handler))
        .route("/tasks/:task_id/pause", post(pause_handler))
        .route("/stop", post(stop_handler))
        .route("/switch/confirm", post(confirm_switch_handler))
        .route("/switch/cancel", post(cancel_switch_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
