//! HTTP endpoint handlers
//!
//! Thin adapters between HTTP and the engine. Operations never fail from the
//! caller's point of view (validation problems surface as notices in the
//! response/status payloads); only an internal state-lock failure maps to a
//! 500.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::state::engine::StopReason;
use crate::state::task::Task;
use crate::state::AppState;

use super::responses::{ApiResponse, HealthResponse, StatusResponse};

/// Body for POST /stop
#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub task_id: Option<String>,
    pub reason: StopReason,
}

fn internal_error(context: &str, e: String) -> StatusCode {
    error!("{}: {}", context, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

fn operation_response(
    state: &Arc<AppState>,
    message: &str,
) -> Result<Json<ApiResponse>, StatusCode> {
    let timer = state
        .timer_state()
        .map_err(|e| internal_error("Failed to read timer state", e))?;
    Ok(Json(ApiResponse::ok(message.to_string(), timer)))
}

/// Handle PUT /tasks - replace the task collection
pub async fn set_tasks_handler(
    State(state): State<Arc<AppState>>,
    Json(tasks): Json<Vec<Task>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let count = tasks.len();
    state
        .set_tasks(tasks)
        .map_err(|e| internal_error("Failed to update task collection", e))?;
    info!("Task collection replaced ({} tasks)", count);
    operation_response(&state, &format!("Task collection updated ({} tasks)", count))
}

/// Handle POST /tasks/:task_id/start - start or resume a task timer
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    state
        .start_timer(&task_id)
        .map_err(|e| internal_error("Failed to start timer", e))?;
    operation_response(&state, "Start request processed")
}

/// Handle POST /tasks/:task_id/pause - pause the running task timer
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    state
        .pause_timer(&task_id)
        .map_err(|e| internal_error("Failed to pause timer", e))?;
    operation_response(&state, "Pause request processed")
}

/// Handle POST /stop - stop the active timer (completed or manual)
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StopRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    state
        .stop_timer(request.task_id.as_deref(), request.reason)
        .map_err(|e| internal_error("Failed to stop timer", e))?;
    operation_response(&state, "Stop request processed")
}

/// Handle POST /switch/confirm - confirm a pending task switch
pub async fn confirm_switch_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    state
        .confirm_switch()
        .map_err(|e| internal_error("Failed to confirm switch", e))?;
    operation_response(&state, "Switch confirmed")
}

/// Handle POST /switch/cancel - abandon a pending task switch
pub async fn cancel_switch_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse>, StatusCode> {
    state
        .cancel_switch()
        .map_err(|e| internal_error("Failed to cancel switch", e))?;
    operation_response(&state, "Switch cancelled")
}

/// Handle GET /status - full timer projection plus server metadata
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let projection = state
        .status_projection()
        .map_err(|e| internal_error("Failed to read status projection", e))?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer: projection.timer,
        paused_remaining_by_task: projection.paused_remaining_by_task,
        overdue_by_task: projection.overdue_by_task,
        switch_prompt: projection.switch_prompt,
        notices: projection.notices,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
