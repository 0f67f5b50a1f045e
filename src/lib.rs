//! Taskwatch - a persistent per-task work timer engine
//!
//! This library tracks elapsed and remaining work time per task, survives
//! process restarts by reconciling saved state against real elapsed
//! wall-clock time, enforces a single globally-active timer, and exposes a
//! switch-confirmation flow for moving the timer between tasks.

pub mod api;
pub mod config;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use state::AppState;
pub use store::{FileTimerStore, TimerStore};
pub use utils::signals::shutdown_signal;
