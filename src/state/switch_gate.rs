//! Switch-confirmation gate
//!
//! Small state machine layered over the engine: a start request for a task
//! other than the one currently running is held here until the agent
//! explicitly confirms or cancels the switch.

use serde::{Deserialize, Serialize};

/// Gate state - strict two-state FSM
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SwitchGate {
    #[default]
    Idle,
    AwaitingConfirmation {
        pending_task_id: String,
    },
}

impl SwitchGate {
    pub fn is_open(&self) -> bool {
        matches!(self, SwitchGate::AwaitingConfirmation { .. })
    }

    pub fn pending_task_id(&self) -> Option<&str> {
        match self {
            SwitchGate::AwaitingConfirmation { pending_task_id } => Some(pending_task_id),
            SwitchGate::Idle => None,
        }
    }

    /// Hold a start request for `task_id` until confirmed or cancelled
    pub fn open_for(&mut self, task_id: &str) {
        *self = SwitchGate::AwaitingConfirmation {
            pending_task_id: task_id.to_string(),
        };
    }

    /// Close the gate, returning the held task id if one was pending
    pub fn close(&mut self) -> Option<String> {
        match std::mem::take(self) {
            SwitchGate::AwaitingConfirmation { pending_task_id } => Some(pending_task_id),
            SwitchGate::Idle => None,
        }
    }
}

/// Data a confirmation dialog needs to render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchPrompt {
    /// Task whose timer is currently running
    pub current_task_id: String,
    pub current_task_name: String,
    /// Remaining countdown or +overdue of the current timer, preformatted
    pub current_display_time: String,
    /// Task the agent asked to switch to
    pub pending_task_id: String,
    pub pending_task_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_round_trip() {
        let mut gate = SwitchGate::default();
        assert!(!gate.is_open());
        assert_eq!(gate.close(), None);

        gate.open_for("t2");
        assert!(gate.is_open());
        assert_eq!(gate.pending_task_id(), Some("t2"));

        assert_eq!(gate.close(), Some("t2".to_string()));
        assert!(!gate.is_open());
    }

    #[test]
    fn reopening_replaces_pending_task() {
        let mut gate = SwitchGate::default();
        gate.open_for("t2");
        gate.open_for("t3");
        assert_eq!(gate.pending_task_id(), Some("t3"));
    }
}
