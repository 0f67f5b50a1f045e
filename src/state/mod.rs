//! State management module
//!
//! This module contains all timer-state structures and the engine that
//! owns them.

pub mod app_state;
pub mod engine;
pub mod notice;
pub mod switch_gate;
pub mod task;
pub mod timer_entry;

// Re-export main types
pub use app_state::AppState;
pub use engine::{StopReason, TimerEngine, TimerView};
pub use notice::{Notice, NoticeLevel};
pub use switch_gate::{SwitchGate, SwitchPrompt};
pub use task::{Task, TaskStatus};
pub use timer_entry::TimerEntry;
