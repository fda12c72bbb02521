//! HBOT Session - session countdown host
//!
//! This is the main entry point for the hbot-session application.

use std::sync::Arc;
use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use hbot_session::{
    api::create_router,
    config::Config,
    services::{
        AlertSink, HttpUsernameDirectory, JsonlSessionLog, MemoryRecorder, SessionRecorder,
        SilentAlert, TerminalBell,
    },
    state::AppState,
    tasks::{finish_alert_task, session_ticker_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("hbot_session={},tower_http=info", config.log_level()))
        .init();

    info!("Starting hbot-session server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, tick={}ms, smooth={}ms",
        config.host, config.port, config.tick_ms, config.smooth_ms
    );

    let settings = config
        .timer_settings()
        .context("Invalid timer configuration")?;

    let recorder: Arc<dyn SessionRecorder> = if config.no_log {
        info!("Session log disabled, keeping confirmed sessions in memory");
        Arc::new(MemoryRecorder::new())
    } else {
        info!("Recording confirmed sessions to {}", config.session_log.display());
        Arc::new(JsonlSessionLog::new(config.session_log.clone()))
    };

    let directory = HttpUsernameDirectory::new(config.api_base_url.clone(), config.api_timeout())
        .context("Failed to set up username directory client")?;

    let alert: Arc<dyn AlertSink> = if config.quiet {
        Arc::new(SilentAlert)
    } else {
        Arc::new(TerminalBell)
    };

    // Create application state
    let state = Arc::new(AppState::new(
        config.host.clone(),
        config.port,
        settings,
        recorder,
        Arc::new(directory),
        config.username_debounce(),
    ));

    // Start the host scheduler and the finish alert
    tokio::spawn(session_ticker_task(Arc::clone(&state)));
    tokio::spawn(finish_alert_task(Arc::clone(&state), alert));

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /session         - Start a session {{minutes, seconds}}");
    info!("  GET    /session         - Current session snapshot");
    info!("  POST   /session/pause   - Pause the countdown");
    info!("  POST   /session/resume  - Resume the countdown");
    info!("  POST   /session/finish  - Record a finished session");
    info!("  DELETE /session         - Discard the session");
    info!("  POST   /username        - Debounced username check {{value}}");
    info!("  GET    /username        - Latest username check result");
    info!("  GET    /username/:name  - Immediate username check");
    info!("  GET    /status          - Server and session status");
    info!("  GET    /health          - Health check");

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
