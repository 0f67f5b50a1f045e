//! Main application state management

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Instant,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::state::engine::{StopReason, TimerEngine, TimerView};
use crate::state::notice::Notice;
use crate::state::switch_gate::SwitchPrompt;
use crate::state::task::Task;
use crate::store::TimerStore;
use crate::utils::clock::Clock;

/// Everything the /status endpoint projects, read under a single engine lock
#[derive(Debug, Clone, Serialize)]
pub struct StatusProjection {
    pub timer: Option<TimerView>,
    pub paused_remaining_by_task: HashMap<String, u64>,
    pub overdue_by_task: HashMap<String, u64>,
    pub switch_prompt: Option<SwitchPrompt>,
    pub notices: Vec<Notice>,
}

/// Application state shared between the HTTP layer and the tick loop.
///
/// The engine is the single owner of timer state; everything else here is
/// plumbing: a watch channel mirroring the active-timer view (it drives the
/// tick loop), the broadcast channel of notices, and request bookkeeping.
pub struct AppState {
    engine: Mutex<TimerEngine>,
    /// Notices fan out to any in-process subscriber
    pub notice_tx: broadcast::Sender<Notice>,
    /// Latest active-timer view; the tick loop watches this
    run_state_tx: watch::Sender<Option<TimerView>>,
    /// Keep the receiver alive to prevent channel closure
    _run_state_rx: watch::Receiver<Option<TimerView>>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    last_action: Mutex<Option<String>>,
    last_action_time: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    /// Create the state; the engine runs recovery against the store here
    pub fn new(
        store: Arc<dyn TimerStore>,
        clock: Arc<dyn Clock>,
        agent_id: String,
        stale_after_ms: u64,
        port: u16,
        host: String,
    ) -> Self {
        let (notice_tx, _) = broadcast::channel(100);
        let engine = TimerEngine::new(store, clock, agent_id, stale_after_ms, notice_tx.clone());
        let (run_state_tx, run_state_rx) = watch::channel(engine.timer_state());

        Self {
            engine: Mutex::new(engine),
            notice_tx,
            run_state_tx,
            _run_state_rx: run_state_rx,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
        }
    }

    /// Run one engine operation, then mirror the resulting active-timer view
    /// onto the watch channel and record the action
    fn with_engine<F>(&self, action: &str, operation: F) -> Result<(), String>
    where
        F: FnOnce(&mut TimerEngine),
    {
        let mut engine = self
            .engine
            .lock()
            .map_err(|e| format!("Failed to lock timer engine: {}", e))?;
        operation(&mut engine);
        let view = engine.timer_state();
        drop(engine);

        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }

        if let Err(e) = self.run_state_tx.send(view) {
            warn!("Failed to publish timer view update: {}", e);
        }

        Ok(())
    }

    /// Replace the task collection (may force-stop the active timer)
    pub fn set_tasks(&self, tasks: Vec<Task>) -> Result<(), String> {
        self.with_engine("set_tasks", |engine| engine.set_tasks(tasks))
    }

    pub fn start_timer(&self, task_id: &str) -> Result<(), String> {
        self.with_engine("start", |engine| engine.start(task_id))
    }

    pub fn pause_timer(&self, task_id: &str) -> Result<(), String> {
        self.with_engine("pause", |engine| engine.pause(task_id))
    }

    pub fn stop_timer(&self, task_id: Option<&str>, reason: StopReason) -> Result<(), String> {
        self.with_engine("stop", |engine| engine.stop_for_task(task_id, reason))
    }

    pub fn confirm_switch(&self) -> Result<(), String> {
        self.with_engine("confirm_switch", |engine| engine.confirm_switch())
    }

    pub fn cancel_switch(&self) -> Result<(), String> {
        self.with_engine("cancel_switch", |engine| engine.cancel_switch())
    }

    /// One tick of the active timer. Not tracked as a user action.
    pub fn tick(&self) -> Result<(), String> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|e| format!("Failed to lock timer engine: {}", e))?;
        engine.tick();
        let view = engine.timer_state();
        drop(engine);

        if let Err(e) = self.run_state_tx.send(view) {
            warn!("Failed to publish timer view update: {}", e);
        }
        Ok(())
    }

    /// All read projections under one lock, so /status sees one instant
    pub fn status_projection(&self) -> Result<StatusProjection, String> {
        let engine = self
            .engine
            .lock()
            .map_err(|e| format!("Failed to lock timer engine: {}", e))?;
        Ok(StatusProjection {
            timer: engine.timer_state(),
            paused_remaining_by_task: engine.paused_remaining_by_task(),
            overdue_by_task: engine.overdue_by_task(),
            switch_prompt: engine.switch_prompt(),
            notices: engine.recent_notices().to_vec(),
        })
    }

    pub fn timer_state(&self) -> Result<Option<TimerView>, String> {
        let engine = self
            .engine
            .lock()
            .map_err(|e| format!("Failed to lock timer engine: {}", e))?;
        Ok(engine.timer_state())
    }

    /// Watch the active-timer view; the tick loop uses this to start and
    /// stop its interval
    pub fn subscribe_run_state(&self) -> watch::Receiver<Option<TimerView>> {
        self.run_state_tx.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::task::TaskStatus;
    use crate::store::MemoryTimerStore;
    use crate::utils::clock::ManualClock;

    fn app_state(tasks: Vec<Task>) -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(1_700_000_000_000));
        let state = AppState::new(
            Arc::new(MemoryTimerStore::new()),
            clock.clone(),
            "agent-7".to_string(),
            24 * 3_600_000,
            20554,
            "127.0.0.1".to_string(),
        );
        state.set_tasks(tasks).unwrap();
        (state, clock)
    }

    fn sample_task(id: &str, minutes: i64) -> Task {
        Task {
            id: id.to_string(),
            name: format!("Task {}", id),
            allotted_duration_minutes: Some(minutes),
            status: TaskStatus::Pending,
        }
    }

    #[test]
    fn watch_channel_tracks_run_state() {
        let (state, _clock) = app_state(vec![sample_task("t1", 2)]);
        let rx = state.subscribe_run_state();
        assert!(rx.borrow().is_none());

        state.start_timer("t1").unwrap();
        assert!(rx.borrow().as_ref().map(|v| v.is_running).unwrap_or(false));

        state.pause_timer("t1").unwrap();
        assert!(!rx.borrow().as_ref().map(|v| v.is_running).unwrap_or(true));

        state.stop_timer(Some("t1"), StopReason::Completed).unwrap();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn notices_are_broadcast() {
        let (state, _clock) = app_state(vec![]);
        let mut rx = state.subscribe_notices();

        // Starting an unknown task produces an error notice
        state.start_timer("ghost").unwrap();
        let notice = rx.try_recv().expect("notice");
        assert!(notice.message.contains("not found"));
    }

    #[test]
    fn status_projection_is_consistent() {
        let (state, clock) = app_state(vec![sample_task("t1", 1)]);
        state.start_timer("t1").unwrap();
        clock.advance_secs(70);
        state.tick().unwrap();

        let status = state.status_projection().unwrap();
        let timer = status.timer.expect("active timer");
        assert!(timer.is_overdue);
        assert_eq!(status.overdue_by_task.get("t1"), Some(&10));
        assert!(!status.notices.is_empty());
    }
}
