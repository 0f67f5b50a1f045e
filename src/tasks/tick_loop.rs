//! Timer tick loop background task

use std::{sync::Arc, time::Duration};
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::state::AppState;

/// Background task that drives the active timer.
///
/// Watches the engine's run-state channel; while a timer is running it
/// fires a 1-second interval that recomputes the active entry from its
/// wall-clock baseline. The interval exists only while something is
/// running - it is dropped the moment the timer pauses or stops, so an
/// idle engine schedules no work.
pub async fn tick_loop_task(state: Arc<AppState>) {
    info!("Starting timer tick loop");

    let mut run_state_rx = state.subscribe_run_state();

    loop {
        let running = run_state_rx
            .borrow_and_update()
            .as_ref()
            .map(|view| view.is_running)
            .unwrap_or(false);

        if !running {
            // Park until the run state changes
            if run_state_rx.changed().await.is_err() {
                debug!("Run-state channel closed, stopping tick loop");
                return;
            }
            continue;
        }

        debug!("Active timer detected, starting 1s tick interval");
        let mut ticker = interval(Duration::from_secs(1));
        // The first interval tick fires immediately; recomputation from the
        // baseline is idempotent so an extra tick costs nothing
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = state.tick() {
                        error!("Failed to tick active timer: {}", e);
                    }
                    let still_running = run_state_rx
                        .borrow()
                        .as_ref()
                        .map(|view| view.is_running)
                        .unwrap_or(false);
                    if !still_running {
                        debug!("Timer no longer running, dropping tick interval");
                        break;
                    }
                }

                changed = run_state_rx.changed() => {
                    match changed {
                        Ok(()) => {
                            let still_running = run_state_rx
                                .borrow()
                                .as_ref()
                                .map(|view| view.is_running)
                                .unwrap_or(false);
                            if !still_running {
                                debug!("Timer stopped or paused, dropping tick interval");
                                break;
                            }
                        }
                        Err(_) => {
                            debug!("Run-state channel closed, stopping tick loop");
                            return;
                        }
                    }
                }
            }
        }
    }
}
