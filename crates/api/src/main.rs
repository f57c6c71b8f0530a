use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docrelay_api::background::upload_reaper;
use docrelay_api::config::ServerConfig;
use docrelay_api::router::build_app_router;
use docrelay_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "docrelay_api=debug,docrelay_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        uploads_dir = %config.uploads_dir.display(),
        scripts_dir = %config.scripts_dir.display(),
        "Loaded server configuration"
    );

    // --- Storage and script registry ---
    let state = AppState::from_config(config.clone())
        .await
        .expect("Failed to initialise uploads or scripts directory");

    let scripts = state
        .registry
        .list()
        .await
        .expect("Failed to read scripts directory");
    tracing::info!(?scripts, "Script registry ready");

    // --- Upload reaper ---
    let reaper = upload_reaper::spawn(
        Arc::clone(&state.staging),
        config.cleanup_interval(),
        config.cleanup_max_age(),
    );
    tracing::info!(
        interval_mins = config.cleanup_interval_mins,
        "Cleanup interval set"
    );

    // --- Router ---
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    reaper.shutdown().await;
    tracing::info!("Upload reaper stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
