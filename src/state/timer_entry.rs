//! Per-task timer entry and its transition math
//!
//! All time arithmetic here is derived from wall-clock baselines captured at
//! the most recent start/resume instant, never from counting ticks. A delayed
//! or missed tick therefore cannot drift the displayed time: every
//! recomputation is `baseline ± floor((now - started_at) / 1000)`.

use serde::{Deserialize, Serialize};

/// Run phase of a timer entry - strict FSM.
///
/// The phase carries exactly the fields that are meaningful in it, so the
/// inconsistent combinations a loose struct would allow (both a start and a
/// pause timestamp set, a baseline on a paused timer) cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Running {
        /// Wall-clock ms of the most recent start/resume (or overdue rebase)
        started_at_ms: u64,
        /// Remaining seconds captured at that instant; 0 once overdue
        baseline_remaining: u64,
        /// Overdue seconds captured at that instant; 0 until overdue
        baseline_overdue: u64,
    },
    Paused {
        /// Wall-clock ms of the most recent pause
        paused_at_ms: u64,
    },
}

/// Saved timer snapshot for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEntry {
    pub task_id: String,
    /// Budget fixed at timer creation: allotted minutes * 60
    pub total_seconds: u64,
    /// Seconds left in the countdown; 0 once overdue
    pub remaining_seconds: u64,
    /// Count-up seconds past the budget; 0 until overdue
    pub overdue_seconds: u64,
    /// One-way within a run: set at budget exhaustion, cleared only by a
    /// fresh start after a full stop
    pub is_overdue: bool,
    pub phase: Phase,
}

/// What a tick did to the active entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Entry is not running; nothing recomputed
    NotRunning,
    /// Countdown or count-up advanced normally
    Advanced,
    /// Countdown hit zero on this tick and the entry flipped to count-up
    WentOverdue,
}

/// How a restored running/paused entry was reconciled on load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Was running, still inside the budget after the away time
    ResumedRunning,
    /// Was already overdue and keeps counting up
    ResumedOverdue,
    /// Crossed into overdue while the process was down
    WentOverdueWhileAway,
    /// Was paused; restored verbatim, no time advanced
    RestoredPaused,
}

/// Whole seconds elapsed since a baseline instant.
/// Saturates at zero so a wall clock stepped backwards never subtracts time.
fn elapsed_secs(started_at_ms: u64, now_ms: u64) -> u64 {
    now_ms.saturating_sub(started_at_ms) / 1000
}

impl TimerEntry {
    /// Brand-new running entry with the full budget
    pub fn start_fresh(task_id: &str, total_seconds: u64, now_ms: u64) -> Self {
        Self {
            task_id: task_id.to_string(),
            total_seconds,
            remaining_seconds: total_seconds,
            overdue_seconds: 0,
            is_overdue: false,
            phase: Phase::Running {
                started_at_ms: now_ms,
                baseline_remaining: total_seconds,
                baseline_overdue: 0,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    /// Transition to Running, carrying saved progress forward as the new
    /// baseline. An overdue entry resumes in count-up mode; a paused
    /// countdown resumes from its frozen remaining seconds.
    pub fn resume_at(&self, now_ms: u64) -> Self {
        let mut entry = self.clone();
        entry.phase = if self.is_overdue {
            Phase::Running {
                started_at_ms: now_ms,
                baseline_remaining: 0,
                baseline_overdue: self.overdue_seconds,
            }
        } else {
            Phase::Running {
                started_at_ms: now_ms,
                baseline_remaining: self.remaining_seconds,
                baseline_overdue: 0,
            }
        };
        entry
    }

    /// Freeze the entry at `now_ms`: Running -> Paused with remaining/overdue
    /// recomputed from the baseline. A non-running entry is returned as-is.
    pub fn freeze_at(&self, now_ms: u64) -> Self {
        let Phase::Running {
            started_at_ms,
            baseline_remaining,
            baseline_overdue,
        } = self.phase
        else {
            return self.clone();
        };

        let elapsed = elapsed_secs(started_at_ms, now_ms);
        let mut entry = self.clone();
        if self.is_overdue {
            entry.remaining_seconds = 0;
            entry.overdue_seconds = baseline_overdue.saturating_add(elapsed);
        } else {
            entry.remaining_seconds = baseline_remaining.saturating_sub(elapsed);
        }
        entry.phase = Phase::Paused {
            paused_at_ms: now_ms,
        };
        entry
    }

    /// One tick: recompute from the baseline. Handles the one-time countdown
    /// -> count-up transition in place, rebasing the start instant so the
    /// next tick measures elapsed count-up time from zero.
    pub fn tick_at(&mut self, now_ms: u64) -> TickOutcome {
        let Phase::Running {
            started_at_ms,
            baseline_remaining,
            baseline_overdue,
        } = self.phase
        else {
            return TickOutcome::NotRunning;
        };

        let elapsed = elapsed_secs(started_at_ms, now_ms);
        if self.is_overdue {
            self.overdue_seconds = baseline_overdue.saturating_add(elapsed);
            return TickOutcome::Advanced;
        }

        if elapsed >= baseline_remaining {
            // Budget exhausted: flip to count-up and rebase
            let past_budget = elapsed - baseline_remaining;
            self.remaining_seconds = 0;
            self.overdue_seconds = past_budget;
            self.is_overdue = true;
            self.phase = Phase::Running {
                started_at_ms: now_ms,
                baseline_remaining: 0,
                baseline_overdue: past_budget,
            };
            return TickOutcome::WentOverdue;
        }

        self.remaining_seconds = baseline_remaining - elapsed;
        TickOutcome::Advanced
    }

    /// Reconcile a restored entry against the wall-clock time that passed
    /// while the process was down. Running entries absorb the away time
    /// (possibly crossing into overdue) and are rebased to `now_ms`; paused
    /// entries are kept exactly as persisted.
    pub fn recover_at(&mut self, now_ms: u64) -> RecoveryOutcome {
        let Phase::Running {
            started_at_ms,
            baseline_remaining,
            baseline_overdue,
        } = self.phase
        else {
            return RecoveryOutcome::RestoredPaused;
        };

        let elapsed = elapsed_secs(started_at_ms, now_ms);
        if self.is_overdue {
            let new_overdue = baseline_overdue.saturating_add(elapsed);
            self.overdue_seconds = new_overdue;
            self.phase = Phase::Running {
                started_at_ms: now_ms,
                baseline_remaining: 0,
                baseline_overdue: new_overdue,
            };
            return RecoveryOutcome::ResumedOverdue;
        }

        if elapsed < baseline_remaining {
            let new_remaining = baseline_remaining - elapsed;
            self.remaining_seconds = new_remaining;
            self.phase = Phase::Running {
                started_at_ms: now_ms,
                baseline_remaining: new_remaining,
                baseline_overdue: 0,
            };
            return RecoveryOutcome::ResumedRunning;
        }

        // Crossed into overdue while the process was down
        let past_budget = elapsed - baseline_remaining;
        self.remaining_seconds = 0;
        self.overdue_seconds = past_budget;
        self.is_overdue = true;
        self.phase = Phase::Running {
            started_at_ms: now_ms,
            baseline_remaining: 0,
            baseline_overdue: past_budget,
        };
        RecoveryOutcome::WentOverdueWhileAway
    }

    /// Short display string for dialogs: countdown as mm:ss, overdue as +mm:ss
    pub fn display_time(&self) -> String {
        if self.is_overdue {
            format!(
                "+{:02}:{:02}",
                self.overdue_seconds / 60,
                self.overdue_seconds % 60
            )
        } else {
            format!(
                "{:02}:{:02}",
                self.remaining_seconds / 60,
                self.remaining_seconds % 60
            )
        }
    }
}
