//! Timer engine
//!
//! Owns all timer state for the session: the single active timer, the map of
//! per-task saved snapshots, the switch-confirmation gate and the task
//! collection pushed in by the host. Every transition that changes `active`
//! or the per-task map is mirrored to the injected store in the same step,
//! so a freshly restarted process always restores a consistent snapshot.
//!
//! Nothing here returns errors to the caller: validation failures and
//! lifecycle events surface as `Notice`s, storage failures are logged.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::state::notice::{Notice, NoticeLevel};
use crate::state::switch_gate::{SwitchGate, SwitchPrompt};
use crate::state::task::Task;
use crate::state::timer_entry::{RecoveryOutcome, TickOutcome, TimerEntry};
use crate::store::{GlobalLock, TimerSnapshot, TimerStore};
use crate::utils::clock::Clock;

/// Notices kept for the /status projection
const RECENT_NOTICE_LIMIT: usize = 32;

/// Why a timer is being stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The timed task was completed; the whole timing session ends
    Completed,
    /// The agent stopped the timer by hand; other saved entries survive
    Manual,
}

/// Flattened view of the active timer for a "now playing" widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerView {
    pub task_id: String,
    pub remaining_seconds: u64,
    pub is_running: bool,
    pub total_seconds: u64,
    pub is_overdue: bool,
    pub overdue_seconds: u64,
    pub locked_by_agent: String,
}

pub struct TimerEngine {
    agent_id: String,
    /// Snapshots older than this are discarded wholesale on load
    stale_after_ms: u64,
    /// Task collection as last pushed by the host - read-only to the engine
    tasks: HashMap<String, Task>,
    /// The single timer that may be counting; exclusively owned here
    active: Option<TimerEntry>,
    timers_by_task: HashMap<String, TimerEntry>,
    gate: SwitchGate,
    store: Arc<dyn TimerStore>,
    clock: Arc<dyn Clock>,
    notice_tx: broadcast::Sender<Notice>,
    recent_notices: Vec<Notice>,
}

impl TimerEngine {
    /// Build the engine and run recovery against whatever the store holds
    pub fn new(
        store: Arc<dyn TimerStore>,
        clock: Arc<dyn Clock>,
        agent_id: String,
        stale_after_ms: u64,
        notice_tx: broadcast::Sender<Notice>,
    ) -> Self {
        let mut engine = Self {
            agent_id,
            stale_after_ms,
            tasks: HashMap::new(),
            active: None,
            timers_by_task: HashMap::new(),
            gate: SwitchGate::Idle,
            store,
            clock,
            notice_tx,
            recent_notices: Vec::new(),
        };
        engine.restore();
        engine
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Restore persisted state, reconciling away time for the active entry.
    /// Never fails: bad or stale persisted data means a fresh session.
    fn restore(&mut self) {
        let snapshot = match self.store.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!("[RECOVERY] No saved state found, starting fresh");
                return;
            }
            Err(e) => {
                error!(
                    "[RECOVERY] Failed to load saved state: {}. Starting fresh.",
                    e
                );
                return;
            }
        };

        let now = self.clock.now_ms();
        let age_ms = now.saturating_sub(snapshot.timestamp);
        if age_ms > self.stale_after_ms {
            info!(
                "[RECOVERY] Saved state is {}h old, discarding it",
                age_ms / 3_600_000
            );
            if let Err(e) = self.store.clear_snapshot() {
                warn!("[RECOVERY] Failed to clear stale snapshot: {}", e);
            }
            if let Err(e) = self.store.clear_lock() {
                warn!("[RECOVERY] Failed to clear stale lock: {}", e);
            }
            return;
        }

        self.timers_by_task = snapshot.timers_by_task;

        let Some(mut entry) = snapshot.active else {
            info!(
                "[RECOVERY] Restored {} saved timer(s), none active",
                self.timers_by_task.len()
            );
            return;
        };

        let task_id = entry.task_id.clone();
        let outcome = entry.recover_at(now);
        let was_running = entry.is_running();
        self.timers_by_task.insert(task_id.clone(), entry.clone());
        self.active = Some(entry.clone());
        self.persist();
        self.write_lock(was_running, &task_id);

        match outcome {
            RecoveryOutcome::ResumedRunning => self.emit(Notice::info(format!(
                "Resumed timer for task {} ({}s remaining)",
                task_id, entry.remaining_seconds
            ))),
            RecoveryOutcome::ResumedOverdue => self.emit(Notice::info(format!(
                "Resumed overdue timer for task {} (+{}s)",
                task_id, entry.overdue_seconds
            ))),
            RecoveryOutcome::WentOverdueWhileAway => self.emit(Notice::warning(format!(
                "Timer for task {} is now OVERDUE (+{}s)",
                task_id, entry.overdue_seconds
            ))),
            RecoveryOutcome::RestoredPaused => self.emit(Notice::info(format!(
                "Restored paused timer for task {}",
                task_id
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Start or resume the timer for `task_id`.
    ///
    /// If another task's timer is running, the request is held in the
    /// switch-confirmation gate instead of starting immediately.
    pub fn start(&mut self, task_id: &str) {
        if !self.validate_start(task_id) {
            return;
        }

        if let Some(active) = &self.active {
            if active.is_running() && active.task_id != task_id {
                debug!(
                    "[GATE] Timer for {} is running, holding start of {} for confirmation",
                    active.task_id, task_id
                );
                self.gate.open_for(task_id);
                return;
            }
        }

        self.start_now(task_id);
    }

    /// Pause the currently running timer. Silent no-op unless `task_id`
    /// names the running task - a stale button press is not an error.
    pub fn pause(&mut self, task_id: &str) {
        let Some(active) = &self.active else {
            return;
        };
        if active.task_id != task_id || !active.is_running() {
            return;
        }

        let now = self.clock.now_ms();
        let frozen = active.freeze_at(now);
        self.timers_by_task
            .insert(frozen.task_id.clone(), frozen.clone());
        self.active = Some(frozen);
        self.persist();
        self.write_lock(false, task_id);
        self.emit(Notice::info(format!(
            "Timer paused for \"{}\"",
            self.task_name(task_id)
        )));
    }

    /// Stop the active timer. With `StopReason::Completed` the entire
    /// timing session is discarded; with `Manual` the per-task saved
    /// entries survive (the stopped task keeps a paused snapshot).
    pub fn stop_for_task(&mut self, task_id: Option<&str>, reason: StopReason) {
        let Some(active) = &self.active else {
            return;
        };
        if let Some(id) = task_id {
            if id != active.task_id {
                return;
            }
        }

        let now = self.clock.now_ms();
        let stopped = active.freeze_at(now);
        let stopped_id = stopped.task_id.clone();
        self.active = None;

        match reason {
            StopReason::Completed => {
                self.timers_by_task.clear();
                if let Err(e) = self.store.clear_snapshot() {
                    error!("[TIMER] Failed to clear snapshot after completion: {}", e);
                }
                self.emit(Notice::success(format!(
                    "Task \"{}\" completed - timer session cleared",
                    self.task_name(&stopped_id)
                )));
            }
            StopReason::Manual => {
                // The task's frozen entry stays in the map: a manual stop
                // behaves as "pause indefinitely" and survives a reload
                self.timers_by_task.insert(stopped_id.clone(), stopped);
                self.persist();
                self.emit(Notice::info(format!(
                    "Timer stopped for \"{}\"",
                    self.task_name(&stopped_id)
                )));
            }
        }

        if let Err(e) = self.store.clear_lock() {
            warn!("[TIMER] Failed to clear lock after stop: {}", e);
        }
    }

    /// Confirm a pending task switch: freeze the running timer, then start
    /// the held task (the gate always closes, even if the held task no
    /// longer validates).
    pub fn confirm_switch(&mut self) {
        let Some(pending) = self.gate.close() else {
            return;
        };

        let now = self.clock.now_ms();
        let mut previous_id = None;
        if let Some(active) = &self.active {
            if active.is_running() {
                let frozen = active.freeze_at(now);
                previous_id = Some(frozen.task_id.clone());
                self.timers_by_task
                    .insert(frozen.task_id.clone(), frozen.clone());
                self.active = Some(frozen);
                self.persist();
            }
        }

        if !self.validate_start(&pending) {
            // The old timer stays frozen; no new timer starts
            if let Some(id) = previous_id {
                self.write_lock(false, &id);
            }
            return;
        }

        self.start_now(&pending);
        if let Some(id) = previous_id {
            self.emit(Notice::info(format!(
                "Switched timer from \"{}\" to \"{}\"",
                self.task_name(&id),
                self.task_name(&pending)
            )));
        }
    }

    /// Abandon a pending switch. The running timer is untouched.
    pub fn cancel_switch(&mut self) {
        if self.gate.close().is_some() {
            debug!("[GATE] Task switch cancelled");
        }
    }

    /// Replace the task collection. If the active timer's task has moved
    /// into a terminal status through some other flow, the timer is
    /// force-stopped and the whole session cleared.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();

        let Some(active) = &self.active else {
            return;
        };
        let Some(task) = self.tasks.get(&active.task_id) else {
            return;
        };
        if !task.status.is_terminal() {
            return;
        }

        let name = task.name.clone();
        let status = task.status;
        self.active = None;
        self.timers_by_task.clear();
        if let Err(e) = self.store.clear_snapshot() {
            error!("[TIMER] Failed to clear snapshot on forced stop: {}", e);
        }
        if let Err(e) = self.store.clear_lock() {
            warn!("[TIMER] Failed to clear lock on forced stop: {}", e);
        }
        self.emit(Notice::info(format!(
            "Timer for \"{}\" stopped: task is {}",
            name,
            status.as_str()
        )));
    }

    /// Advance the active timer by recomputing it from its baseline.
    /// Called once a second by the tick loop while a timer is running.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        let outcome = match self.active.as_mut() {
            Some(active) => active.tick_at(now),
            None => return,
        };

        match outcome {
            TickOutcome::NotRunning => {}
            TickOutcome::Advanced => {
                self.mirror_active();
                self.persist();
            }
            TickOutcome::WentOverdue => {
                // The lock is kept: the timer continues in count-up mode
                let task_id = self
                    .active
                    .as_ref()
                    .map(|a| a.task_id.clone())
                    .unwrap_or_default();
                self.mirror_active();
                self.persist();
                self.emit(Notice::warning(format!(
                    "Task \"{}\" is now OVERDUE",
                    self.task_name(&task_id)
                )));
            }
        }
    }

    // ------------------------------------------------------------------
    // Projections
    // ------------------------------------------------------------------

    /// Flattened active-timer view, or None when nothing is active
    pub fn timer_state(&self) -> Option<TimerView> {
        self.active.as_ref().map(|entry| TimerView {
            task_id: entry.task_id.clone(),
            remaining_seconds: entry.remaining_seconds,
            is_running: entry.is_running(),
            total_seconds: entry.total_seconds,
            is_overdue: entry.is_overdue,
            overdue_seconds: entry.overdue_seconds,
            locked_by_agent: self.agent_id.clone(),
        })
    }

    /// Countdown snapshot per task, for every saved entry not yet overdue
    pub fn paused_remaining_by_task(&self) -> HashMap<String, u64> {
        self.timers_by_task
            .iter()
            .filter(|(_, entry)| !entry.is_overdue)
            .map(|(id, entry)| (id.clone(), entry.remaining_seconds))
            .collect()
    }

    /// Overdue seconds per task, regardless of running state
    pub fn overdue_by_task(&self) -> HashMap<String, u64> {
        self.timers_by_task
            .iter()
            .filter(|(_, entry)| entry.is_overdue)
            .map(|(id, entry)| (id.clone(), entry.overdue_seconds))
            .collect()
    }

    /// Data for the switch-confirmation dialog, when one is pending
    pub fn switch_prompt(&self) -> Option<SwitchPrompt> {
        let pending_id = self.gate.pending_task_id()?;
        let active = self.active.as_ref()?;
        Some(SwitchPrompt {
            current_task_id: active.task_id.clone(),
            current_task_name: self.task_name(&active.task_id),
            current_display_time: active.display_time(),
            pending_task_id: pending_id.to_string(),
            pending_task_name: self.task_name(pending_id),
        })
    }

    pub fn recent_notices(&self) -> &[Notice] {
        &self.recent_notices
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Start preconditions: the task exists, has a usable budget and is not
    /// in a terminal status. Violations emit an error notice and mutate
    /// nothing.
    fn validate_start(&mut self, task_id: &str) -> bool {
        let Some(task) = self.tasks.get(task_id) else {
            self.emit(Notice::error(format!(
                "Cannot start timer: task \"{}\" not found",
                task_id
            )));
            return false;
        };
        if task.budget_seconds().is_none() {
            let name = task.name.clone();
            self.emit(Notice::error(format!(
                "Cannot start timer: no ideal duration set for \"{}\"",
                name
            )));
            return false;
        }
        if task.status.is_terminal() {
            let (name, status) = (task.name.clone(), task.status);
            self.emit(Notice::error(format!(
                "Cannot start timer: task \"{}\" is {}",
                name,
                status.as_str()
            )));
            return false;
        }
        true
    }

    /// Unconditional start/resume; callers have validated and resolved the
    /// single-active policy
    fn start_now(&mut self, task_id: &str) {
        // validate_start guarantees the task and budget exist
        let Some(budget) = self.tasks.get(task_id).and_then(|t| t.budget_seconds()) else {
            return;
        };
        let now = self.clock.now_ms();

        let (entry, resumed) = match self.timers_by_task.get(task_id) {
            Some(saved) if saved.is_overdue => (saved.resume_at(now), true),
            Some(saved) if saved.remaining_seconds > 0 => (saved.resume_at(now), true),
            _ => (TimerEntry::start_fresh(task_id, budget, now), false),
        };

        self.timers_by_task.insert(task_id.to_string(), entry.clone());
        self.active = Some(entry.clone());
        self.persist();
        self.write_lock(true, task_id);

        let name = self.task_name(task_id);
        if resumed && entry.is_overdue {
            self.emit(Notice::info(format!(
                "Resumed overdue timer for \"{}\" (+{}s)",
                name, entry.overdue_seconds
            )));
        } else if resumed {
            self.emit(Notice::info(format!(
                "Resumed timer for \"{}\" ({}s remaining)",
                name, entry.remaining_seconds
            )));
        } else {
            self.emit(Notice::info(format!("Timer started for \"{}\"", name)));
        }
    }

    /// Mirror the active entry into the per-task map so the two never diverge
    fn mirror_active(&mut self) {
        if let Some(active) = &self.active {
            self.timers_by_task
                .insert(active.task_id.clone(), active.clone());
        }
    }

    /// Write the whole snapshot to the store. Failures are logged, never
    /// surfaced - persistence problems must not break the running timer.
    fn persist(&self) {
        let snapshot = TimerSnapshot {
            active: self.active.clone(),
            timers_by_task: self.timers_by_task.clone(),
            timestamp: self.clock.now_ms(),
        };
        if let Err(e) = self.store.save_snapshot(&snapshot) {
            error!("[TIMER] Failed to save snapshot: {}", e);
        }
    }

    fn write_lock(&self, is_locked: bool, task_id: &str) {
        let lock = GlobalLock {
            is_locked,
            task_id: task_id.to_string(),
            agent_id: self.agent_id.clone(),
            task_name: self.task_name(task_id),
        };
        if let Err(e) = self.store.save_lock(&lock) {
            warn!("[TIMER] Failed to save lock: {}", e);
        }
    }

    fn task_name(&self, task_id: &str) -> String {
        self.tasks
            .get(task_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| task_id.to_string())
    }

    /// Record a notice, log it at a matching level and publish it to
    /// in-process subscribers
    fn emit(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => info!("{}", notice.message),
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        }
        self.recent_notices.push(notice.clone());
        if self.recent_notices.len() > RECENT_NOTICE_LIMIT {
            self.recent_notices.remove(0);
        }
        // No subscribers is fine; the ring buffer still has the notice
        let _ = self.notice_tx.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::task::TaskStatus;
    use crate::store::MemoryTimerStore;
    use crate::utils::clock::ManualClock;

    const T0: u64 = 1_700_000_000_000;
    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    fn task(id: &str, minutes: Option<i64>, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            name: format!("Task {}", id),
            allotted_duration_minutes: minutes,
            status,
        }
    }

    struct Harness {
        engine: TimerEngine,
        clock: Arc<ManualClock>,
        store: Arc<MemoryTimerStore>,
    }

    fn harness(tasks: Vec<Task>) -> Harness {
        harness_with_store(tasks, Arc::new(MemoryTimerStore::new()))
    }

    fn harness_with_store(tasks: Vec<Task>, store: Arc<MemoryTimerStore>) -> Harness {
        let clock = Arc::new(ManualClock::at(T0));
        let (notice_tx, _) = broadcast::channel(64);
        let mut engine = TimerEngine::new(
            store.clone(),
            clock.clone(),
            "agent-7".to_string(),
            DAY_MS,
            notice_tx,
        );
        engine.set_tasks(tasks);
        Harness {
            engine,
            clock,
            store,
        }
    }

    fn running_count(engine: &TimerEngine) -> usize {
        engine
            .timers_by_task
            .values()
            .filter(|e| e.is_running())
            .count()
    }

    #[test]
    fn start_counts_down_from_budget() {
        let mut h = harness(vec![task("t1", Some(1), TaskStatus::Pending)]);
        h.engine.start("t1");

        let view = h.engine.timer_state().expect("active timer");
        assert_eq!(view.remaining_seconds, 60);
        assert_eq!(view.total_seconds, 60);
        assert!(view.is_running);
        assert!(!view.is_overdue);
        assert_eq!(view.locked_by_agent, "agent-7");
    }

    #[test]
    fn start_rejects_missing_task_and_missing_budget() {
        let mut h = harness(vec![
            task("nobudget", None, TaskStatus::Pending),
            task("zero", Some(0), TaskStatus::Pending),
        ]);

        h.engine.start("ghost");
        h.engine.start("nobudget");
        h.engine.start("zero");

        assert!(h.engine.timer_state().is_none());
        let errors: Vec<_> = h
            .engine
            .recent_notices()
            .iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .collect();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn start_rejects_terminal_task() {
        let mut h = harness(vec![task("done", Some(10), TaskStatus::Completed)]);
        h.engine.start("done");
        assert!(h.engine.timer_state().is_none());
    }

    #[test]
    fn at_most_one_timer_runs() {
        let mut h = harness(vec![
            task("a", Some(10), TaskStatus::Pending),
            task("b", Some(10), TaskStatus::Pending),
            task("c", Some(10), TaskStatus::Pending),
        ]);

        h.engine.start("a");
        assert_eq!(running_count(&h.engine), 1);

        // Switch a -> b via the gate
        h.engine.start("b");
        h.engine.confirm_switch();
        assert_eq!(running_count(&h.engine), 1);

        // And b -> c
        h.engine.start("c");
        h.engine.confirm_switch();
        assert_eq!(running_count(&h.engine), 1);

        h.engine.pause("c");
        assert_eq!(running_count(&h.engine), 0);
    }

    #[test]
    fn elapsed_time_fidelity_without_ticks() {
        let mut h = harness(vec![task("t1", Some(5), TaskStatus::Pending)]);
        h.engine.start("t1");

        // 137 real seconds pass with zero intermediate ticks
        h.clock.advance_secs(137);
        h.engine.tick();

        let view = h.engine.timer_state().unwrap();
        assert_eq!(view.remaining_seconds, 300 - 137);
    }

    #[test]
    fn overdue_transition_is_one_way() {
        let mut h = harness(vec![task("t1", Some(1), TaskStatus::Pending)]);
        h.engine.start("t1");

        h.clock.advance_secs(70);
        h.engine.tick();
        assert!(h.engine.timer_state().unwrap().is_overdue);

        // Pausing and resuming does not clear overdue
        h.engine.pause("t1");
        assert!(h.engine.timer_state().unwrap().is_overdue);
        h.engine.start("t1");
        assert!(h.engine.timer_state().unwrap().is_overdue);

        let mut last = h.engine.timer_state().unwrap().overdue_seconds;
        for _ in 0..5 {
            h.clock.advance_secs(3);
            h.engine.tick();
            let now = h.engine.timer_state().unwrap().overdue_seconds;
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn overdue_clears_only_after_full_stop_and_fresh_start() {
        let mut h = harness(vec![task("t1", Some(1), TaskStatus::Pending)]);
        h.engine.start("t1");
        h.clock.advance_secs(70);
        h.engine.tick();
        assert!(h.engine.timer_state().unwrap().is_overdue);

        h.engine.stop_for_task(Some("t1"), StopReason::Completed);
        assert!(h.engine.timer_state().is_none());

        h.engine.start("t1");
        let view = h.engine.timer_state().unwrap();
        assert!(!view.is_overdue);
        assert_eq!(view.remaining_seconds, 60);
    }

    #[test]
    fn pause_resume_round_trip_skips_paused_time() {
        let mut h = harness(vec![task("t1", Some(5), TaskStatus::Pending)]);
        h.engine.start("t1");

        h.clock.advance_secs(5);
        h.engine.tick();
        h.engine.pause("t1");
        assert_eq!(h.engine.timer_state().unwrap().remaining_seconds, 295);

        // 100 seconds pass while paused
        h.clock.advance_secs(100);
        h.engine.start("t1");

        let view = h.engine.timer_state().unwrap();
        assert!(view.is_running);
        assert_eq!(view.remaining_seconds, 295);

        // And ticking continues from there, not from 195
        h.clock.advance_secs(10);
        h.engine.tick();
        assert_eq!(h.engine.timer_state().unwrap().remaining_seconds, 285);
    }

    #[test]
    fn pause_of_non_active_task_is_silent_noop() {
        let mut h = harness(vec![
            task("a", Some(5), TaskStatus::Pending),
            task("b", Some(5), TaskStatus::Pending),
        ]);
        h.engine.start("a");
        let before = h.engine.timer_state();

        let notices_before = h.engine.recent_notices().len();
        h.engine.pause("b");
        assert_eq!(h.engine.timer_state(), before);
        assert_eq!(h.engine.recent_notices().len(), notices_before);
    }

    #[test]
    fn switch_request_opens_gate_without_starting() {
        let mut h = harness(vec![
            task("a", Some(5), TaskStatus::Pending),
            task("b", Some(5), TaskStatus::Pending),
        ]);
        h.engine.start("a");
        h.clock.advance_secs(10);
        h.engine.tick();

        h.engine.start("b");

        // A still running, B not started
        let view = h.engine.timer_state().unwrap();
        assert_eq!(view.task_id, "a");
        assert!(view.is_running);

        let prompt = h.engine.switch_prompt().expect("prompt");
        assert_eq!(prompt.current_task_id, "a");
        assert_eq!(prompt.pending_task_id, "b");
        assert_eq!(prompt.current_display_time, "04:50");
    }

    #[test]
    fn cancel_switch_leaves_timer_untouched() {
        let mut h = harness(vec![
            task("a", Some(5), TaskStatus::Pending),
            task("b", Some(5), TaskStatus::Pending),
        ]);
        h.engine.start("a");
        h.clock.advance_secs(10);
        h.engine.tick();
        let before = h.engine.timer_state();

        h.engine.start("b");
        h.engine.cancel_switch();

        assert_eq!(h.engine.timer_state(), before);
        assert!(h.engine.switch_prompt().is_none());

        // The gate interaction itself costs no time
        h.engine.tick();
        assert_eq!(h.engine.timer_state().unwrap().remaining_seconds, 290);
    }

    #[test]
    fn confirm_switch_pauses_old_and_starts_new() {
        let mut h = harness(vec![
            task("a", Some(5), TaskStatus::Pending),
            task("b", Some(3), TaskStatus::Pending),
        ]);
        h.engine.start("a");
        h.clock.advance_secs(10);
        h.engine.tick();

        h.engine.start("b");
        h.engine.confirm_switch();

        let view = h.engine.timer_state().unwrap();
        assert_eq!(view.task_id, "b");
        assert!(view.is_running);
        assert_eq!(view.remaining_seconds, 180);

        // A is frozen at 290 remaining
        let paused = h.engine.paused_remaining_by_task();
        assert_eq!(paused.get("a"), Some(&290));
        assert_eq!(running_count(&h.engine), 1);

        // Lock now names b
        let lock = h.store.load_lock().unwrap().expect("lock");
        assert!(lock.is_locked);
        assert_eq!(lock.task_id, "b");
    }

    #[test]
    fn confirm_with_invalid_pending_task_still_freezes_old() {
        let mut h = harness(vec![
            task("a", Some(5), TaskStatus::Pending),
            task("b", Some(3), TaskStatus::Pending),
        ]);
        h.engine.start("a");
        h.clock.advance_secs(10);
        h.engine.start("b");

        // B loses its budget while the dialog is open
        h.engine.set_tasks(vec![
            task("a", Some(5), TaskStatus::Pending),
            task("b", None, TaskStatus::Pending),
        ]);
        h.engine.confirm_switch();

        // A ends up paused, nothing runs, the gate is closed
        let view = h.engine.timer_state().unwrap();
        assert_eq!(view.task_id, "a");
        assert!(!view.is_running);
        assert_eq!(view.remaining_seconds, 290);
        assert!(h.engine.switch_prompt().is_none());
    }

    #[test]
    fn forced_stop_on_terminal_status() {
        let mut h = harness(vec![task("x", Some(5), TaskStatus::InProgress)]);
        h.engine.start("x");
        h.clock.advance_secs(10);
        h.engine.tick();

        h.engine
            .set_tasks(vec![task("x", Some(5), TaskStatus::Completed)]);

        assert!(h.engine.timer_state().is_none());
        assert!(h.engine.paused_remaining_by_task().is_empty());
        assert!(h.store.load_snapshot().unwrap().is_none());
        assert!(h.store.load_lock().unwrap().is_none());

        let last = h.engine.recent_notices().last().unwrap();
        assert!(last.message.contains("completed"));
    }

    #[test]
    fn completed_stop_clears_entire_session() {
        let mut h = harness(vec![
            task("a", Some(5), TaskStatus::Pending),
            task("b", Some(5), TaskStatus::Pending),
        ]);
        // Leave a paused entry for a, then complete b
        h.engine.start("a");
        h.clock.advance_secs(5);
        h.engine.pause("a");
        h.engine.start("b");
        h.clock.advance_secs(5);

        h.engine.stop_for_task(Some("b"), StopReason::Completed);

        assert!(h.engine.timer_state().is_none());
        assert!(h.engine.paused_remaining_by_task().is_empty());
        assert!(h.store.load_snapshot().unwrap().is_none());
        assert!(h.store.load_lock().unwrap().is_none());
    }

    #[test]
    fn manual_stop_keeps_saved_entry() {
        // Pins the observed behavior: a manually stopped task keeps a
        // paused snapshot in the per-task map and in the store
        let mut h = harness(vec![task("a", Some(5), TaskStatus::Pending)]);
        h.engine.start("a");
        h.clock.advance_secs(5);

        h.engine.stop_for_task(Some("a"), StopReason::Manual);

        assert!(h.engine.timer_state().is_none());
        assert_eq!(h.engine.paused_remaining_by_task().get("a"), Some(&295));
        assert_eq!(running_count(&h.engine), 0);

        let snapshot = h.store.load_snapshot().unwrap().expect("snapshot");
        assert!(snapshot.active.is_none());
        assert!(snapshot.timers_by_task.contains_key("a"));
        assert!(h.store.load_lock().unwrap().is_none());
    }

    #[test]
    fn stop_with_mismatched_task_id_is_noop() {
        let mut h = harness(vec![
            task("a", Some(5), TaskStatus::Pending),
            task("b", Some(5), TaskStatus::Pending),
        ]);
        h.engine.start("a");
        h.engine.stop_for_task(Some("b"), StopReason::Completed);
        assert!(h.engine.timer_state().is_some());
    }

    #[test]
    fn restart_resumes_running_timer_within_budget() {
        let store = Arc::new(MemoryTimerStore::new());
        {
            let mut h = harness_with_store(
                vec![task("t1", Some(5), TaskStatus::Pending)],
                store.clone(),
            );
            h.engine.start("t1");
        }

        // New session 40s later; the away time must be accounted for
        let clock = Arc::new(ManualClock::at(T0 + 40_000));
        let (notice_tx, _) = broadcast::channel(64);
        let engine = TimerEngine::new(
            store.clone(),
            clock,
            "agent-7".to_string(),
            DAY_MS,
            notice_tx,
        );

        let view = engine.timer_state().expect("restored timer");
        assert!(view.is_running);
        assert_eq!(view.remaining_seconds, 260);
    }

    #[test]
    fn restart_detects_overdue_crossed_while_away() {
        let store = Arc::new(MemoryTimerStore::new());
        {
            let mut h = harness_with_store(
                vec![task("t1", Some(1), TaskStatus::Pending)],
                store.clone(),
            );
            h.engine.start("t1");
        }

        let clock = Arc::new(ManualClock::at(T0 + 90_000));
        let (notice_tx, _) = broadcast::channel(64);
        let engine = TimerEngine::new(
            store.clone(),
            clock,
            "agent-7".to_string(),
            DAY_MS,
            notice_tx,
        );

        let view = engine.timer_state().expect("restored timer");
        assert!(view.is_overdue);
        assert_eq!(view.remaining_seconds, 0);
        assert_eq!(view.overdue_seconds, 30);
        let last = engine.recent_notices().last().unwrap();
        assert_eq!(last.level, NoticeLevel::Warning);
        assert!(last.message.contains("OVERDUE"));
    }

    #[test]
    fn restart_restores_paused_timer_verbatim() {
        let store = Arc::new(MemoryTimerStore::new());
        {
            let mut h = harness_with_store(
                vec![task("t1", Some(5), TaskStatus::Pending)],
                store.clone(),
            );
            h.engine.start("t1");
            h.clock.advance_secs(5);
            h.engine.pause("t1");
        }

        // Hours later, the paused countdown has not moved
        let clock = Arc::new(ManualClock::at(T0 + 3_600_000));
        let (notice_tx, _) = broadcast::channel(64);
        let engine = TimerEngine::new(
            store.clone(),
            clock,
            "agent-7".to_string(),
            DAY_MS,
            notice_tx,
        );

        let view = engine.timer_state().expect("restored timer");
        assert!(!view.is_running);
        assert_eq!(view.remaining_seconds, 295);
    }

    #[test]
    fn stale_snapshot_is_evicted_on_load() {
        let store = Arc::new(MemoryTimerStore::new());
        {
            let mut h = harness_with_store(
                vec![task("t1", Some(5), TaskStatus::Pending)],
                store.clone(),
            );
            h.engine.start("t1");
        }

        // 25 hours later the snapshot is past the 24h window
        let clock = Arc::new(ManualClock::at(T0 + 25 * 3_600_000));
        let (notice_tx, _) = broadcast::channel(64);
        let engine = TimerEngine::new(
            store.clone(),
            clock,
            "agent-7".to_string(),
            DAY_MS,
            notice_tx,
        );

        assert!(engine.timer_state().is_none());
        assert!(engine.paused_remaining_by_task().is_empty());
        assert!(store.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn one_minute_budget_scenario() {
        let mut h = harness(vec![task("t1", Some(1), TaskStatus::Pending)]);
        h.engine.start("t1");
        assert_eq!(h.engine.timer_state().unwrap().remaining_seconds, 60);

        // 70 seconds of 1s ticks
        for _ in 0..70 {
            h.clock.advance_secs(1);
            h.engine.tick();
        }

        let view = h.engine.timer_state().unwrap();
        assert!(view.is_overdue);
        assert_eq!(view.remaining_seconds, 0);
        assert_eq!(view.overdue_seconds, 10);
    }

    #[test]
    fn overdue_projection_includes_paused_entries() {
        let mut h = harness(vec![
            task("a", Some(1), TaskStatus::Pending),
            task("b", Some(5), TaskStatus::Pending),
        ]);
        h.engine.start("a");
        h.clock.advance_secs(70);
        h.engine.tick();
        h.engine.pause("a");

        h.engine.start("b");

        let overdue = h.engine.overdue_by_task();
        assert_eq!(overdue.get("a"), Some(&10));
        let paused = h.engine.paused_remaining_by_task();
        assert!(!paused.contains_key("a"));
        assert!(paused.contains_key("b"));
    }

    #[test]
    fn lock_follows_run_state() {
        let mut h = harness(vec![task("a", Some(5), TaskStatus::Pending)]);

        h.engine.start("a");
        let lock = h.store.load_lock().unwrap().expect("lock");
        assert!(lock.is_locked);
        assert_eq!(lock.agent_id, "agent-7");
        assert_eq!(lock.task_name, "Task a");

        h.engine.pause("a");
        let lock = h.store.load_lock().unwrap().expect("lock");
        assert!(!lock.is_locked);
        assert_eq!(lock.task_id, "a");

        h.engine.start("a");
        h.engine.stop_for_task(None, StopReason::Manual);
        assert!(h.store.load_lock().unwrap().is_none());
    }
}
