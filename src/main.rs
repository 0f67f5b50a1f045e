//! Taskwatch - a persistent per-task work timer engine
//!
//! This is the main entry point for the taskwatch server.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use taskwatch::{
    api::create_router,
    config::Config,
    state::AppState,
    store::FileTimerStore,
    tasks::tick_loop_task,
    utils::{clock::SystemClock, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("taskwatch={},tower_http=info", config.log_level()))
        .init();

    info!("Starting taskwatch server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, agent={}, data_dir={}, stale_after={}h",
        config.host,
        config.port,
        config.agent_id,
        config.data_dir.display(),
        config.stale_hours
    );

    // Persisted timer state lives under the data directory
    let store = Arc::new(FileTimerStore::new(&config.data_dir)?);

    // Create application state; this runs recovery against the store
    let state = Arc::new(AppState::new(
        store,
        Arc::new(SystemClock),
        config.agent_id.clone(),
        config.stale_after_ms(),
        config.port,
        config.host.clone(),
    ));

    // Start the tick loop background task
    let tick_state = Arc::clone(&state);
    tokio::spawn(async move {
        tick_loop_task(tick_state).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  PUT  /tasks                 - Replace the task collection");
    info!("  POST /tasks/:id/start       - Start or resume a task timer");
    info!("  POST /tasks/:id/pause       - Pause the running task timer");
    info!("  POST /stop                  - Stop the active timer (completed/manual)");
    info!("  POST /switch/confirm        - Confirm a pending task switch");
    info!("  POST /switch/cancel         - Cancel a pending task switch");
    info!("  GET  /status                - Timer projections and notices");
    info!("  GET  /health                - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
