//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state::engine::TimerView;
use crate::state::notice::Notice;
use crate::state::switch_gate::SwitchPrompt;

/// API response structure for timer operation endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Active-timer view after the operation, if any timer is active
    pub timer: Option<TimerView>,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: String, message: String, timer: Option<TimerView>) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Create an accepted-operation response
    pub fn ok(message: String, timer: Option<TimerView>) -> Self {
        Self::new("ok".to_string(), message, timer)
    }
}

/// Full status response: projections, recent notices and server metadata
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub timer: Option<TimerView>,
    pub paused_remaining_by_task: HashMap<String, u64>,
    pub overdue_by_task: HashMap<String, u64>,
    pub switch_prompt: Option<SwitchPrompt>,
    pub notices: Vec<Notice>,
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
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
