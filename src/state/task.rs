//! External task entity supplied by the caller

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task, as reported by the host system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
    Cancelled,
    Reassigned,
    QcApproved,
}

impl TaskStatus {
    /// Statuses after which no timer may run for the task
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::QcApproved | TaskStatus::Cancelled
        )
    }

    /// Stable string form used in notices and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Reassigned => "reassigned",
            TaskStatus::QcApproved => "qc_approved",
        }
    }
}

/// Task as seen by the timer engine - read-only external data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    /// Ideal time budget in minutes; a task without one cannot be timed
    pub allotted_duration_minutes: Option<i64>,
    pub status: TaskStatus,
}

impl Task {
    /// Budget in whole seconds, if a usable budget is set
    pub fn budget_seconds(&self) -> Option<u64> {
        match self.allotted_duration_minutes {
            Some(minutes) if minutes > 0 => Some(minutes as u64 * 60),
            _ => None,
        }
    }
}
