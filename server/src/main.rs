//! TodoLists Server - Main entry point.
//!
//! This binary starts the todo list web application with:
//! - Structured JSON logging
//! - Graceful shutdown handling (SIGTERM/SIGINT)
//! - Background cleanup of expired sessions
//!
//! # Configuration
//!
//! See [`todolists_server::config`] for environment variable configuration.
//!
//! # Example
//!
//! ```bash
//! # Development
//! cargo run --bin todolists-server
//!
//! # Behind TLS
//! TODOLISTS_SECURE_COOKIE=true \
//! TODOLISTS_SESSION_TTL_SECS=3600 \
//! PORT=8080 \
//! cargo run --release --bin todolists-server
//! ```

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use todolists_server::config::Config;
use todolists_server::routes::{create_router, AppState};

/// Interval between sweeps of expired sessions.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            eprintln!("Error: {err}");
            eprintln!();
            eprintln!("Optional environment variables:");
            eprintln!("  PORT                        - HTTP server port (default: 8080)");
            eprintln!("  RUST_LOG                    - Log level filter (default: info)");
            eprintln!("  TODOLISTS_SESSION_TTL_SECS  - Session idle lifetime (default: 86400)");
            eprintln!("  TODOLISTS_MAX_SESSIONS      - Live session limit (default: 10000)");
            eprintln!("  TODOLISTS_SECURE_COOKIE     - Send cookie over HTTPS only ('true')");
            return ExitCode::from(1);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = format!("{err:#}"), "Server failed");
            ExitCode::from(1)
        }
    }
}

async fn run(config: Config) -> Result<()> {
    info!(
        port = config.port,
        session_ttl_secs = config.session_ttl.as_secs(),
        max_sessions = config.max_sessions,
        secure_cookie = config.secure_cookie,
        "TodoLists server starting"
    );

    let state = AppState::new(config.clone()).context("failed to build application state")?;

    let cleanup_handle = state.sessions.spawn_cleanup_task(SESSION_CLEANUP_INTERVAL);
    info!(
        interval_secs = SESSION_CLEANUP_INTERVAL.as_secs(),
        "Session cleanup task started"
    );

    let app = create_router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;
    info!(port = config.port, address = %bind_addr, "Server listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    cleanup_handle.abort();
    info!("Session cleanup task stopped");

    result?;
    info!("Server shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing.
///
/// JSON output, filtered by `RUST_LOG` with a default of `info`.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,axum::rejection=trace"));

    let json_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .init();
}

/// Resolves when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
