//! Persistence port for timer state
//!
//! The engine never touches storage directly; it talks to a `TimerStore`,
//! which keeps the state-transition logic pure and lets tests swap in the
//! in-memory adapter.

pub mod file_store;

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::state::timer_entry::TimerEntry;

pub use file_store::FileTimerStore;

/// Whole-engine persisted state, written as one document on every change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub active: Option<TimerEntry>,
    pub timers_by_task: HashMap<String, TimerEntry>,
    /// Wall-clock ms of the last write; drives staleness eviction on load
    pub timestamp: u64,
}

/// Advisory "a timer is running" marker - session-local, not a cross-device
/// mutex. `is_locked` flips to false on pause; the document is removed
/// entirely on stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalLock {
    pub is_locked: bool,
    pub task_id: String,
    pub agent_id: String,
    pub task_name: String,
}

/// Storage port for the timer engine
pub trait TimerStore: Send + Sync {
    fn load_snapshot(&self) -> Result<Option<TimerSnapshot>>;
    fn save_snapshot(&self, snapshot: &TimerSnapshot) -> Result<()>;
    fn clear_snapshot(&self) -> Result<()>;

    fn load_lock(&self) -> Result<Option<GlobalLock>>;
    fn save_lock(&self, lock: &GlobalLock) -> Result<()>;
    fn clear_lock(&self) -> Result<()>;
}

/// In-memory adapter - used by tests and as a no-persistence fallback
#[derive(Debug, Default)]
pub struct MemoryTimerStore {
    snapshot: Mutex<Option<TimerSnapshot>>,
    lock: Mutex<Option<GlobalLock>>,
}

impl MemoryTimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a snapshot, as if left behind by a previous session
    pub fn with_snapshot(snapshot: TimerSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            lock: Mutex::new(None),
        }
    }
}

impl TimerStore for MemoryTimerStore {
    fn load_snapshot(&self) -> Result<Option<TimerSnapshot>> {
        Ok(self
            .snapshot
            .lock()
            .map_err(|e| anyhow::anyhow!("snapshot mutex poisoned: {}", e))?
            .clone())
    }

    fn save_snapshot(&self, snapshot: &TimerSnapshot) -> Result<()> {
        *self
            .snapshot
            .lock()
            .map_err(|e| anyhow::anyhow!("snapshot mutex poisoned: {}", e))? =
            Some(snapshot.clone());
        Ok(())
    }

    fn clear_snapshot(&self) -> Result<()> {
        *self
            .snapshot
            .lock()
            .map_err(|e| anyhow::anyhow!("snapshot mutex poisoned: {}", e))? = None;
        Ok(())
    }

    fn load_lock(&self) -> Result<Option<GlobalLock>> {
        Ok(self
            .lock
            .lock()
            .map_err(|e| anyhow::anyhow!("lock mutex poisoned: {}", e))?
            .clone())
    }

    fn save_lock(&self, lock: &GlobalLock) -> Result<()> {
        *self
            .lock
            .lock()
            .map_err(|e| anyhow::anyhow!("lock mutex poisoned: {}", e))? = Some(lock.clone());
        Ok(())
    }

    fn clear_lock(&self) -> Result<()> {
        *self
            .lock
            .lock()
            .map_err(|e| anyhow::anyhow!("lock mutex poisoned: {}", e))? = None;
        Ok(())
    }
}
