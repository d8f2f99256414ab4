//! Server lifecycle and state machine (spec §4.D):
//! `stopped -> starting -> serving -> draining -> exit`.

use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use telemetry_concurrency::{WriterGuard, WriterSerializer};
use telemetry_core::Result;
use telemetry_storage::Store;

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;

/// Builds the axum router; split out from [`run`] so tests can exercise
/// handlers against an in-memory state without a bound socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/v1/runs", post(handlers::create_run))
        .route("/api/v1/runs", get(handlers::list_runs))
        .route("/api/v1/runs/batch", post(handlers::create_runs_batch))
        .route("/api/v1/runs/{event_id}", get(handlers::get_run))
        .route("/api/v1/runs/{event_id}", patch(handlers::patch_run))
        .route("/api/v1/metadata", get(handlers::metadata))
        .route("/api/v1/aggregate", get(handlers::aggregate))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

/// Runs the full `starting -> serving -> draining -> exit` lifecycle
/// (spec §4.D). Acquires the [`WriterGuard`] fail-fast, opens the store,
/// verifies schema, binds the listener, then serves until SIGTERM/SIGINT
/// with a bounded drain.
pub async fn run(cfg: ServerConfig) -> Result<()> {
    info!(bind_addr = %cfg.bind_addr, db_path = %cfg.db_path.display(), "starting");

    let guard = match WriterGuard::acquire(&cfg.lock_path) {
        Ok(g) => g,
        Err(e) => {
            error!(error = %e, "failed to acquire writer lock, exiting");
            return Err(e);
        }
    };

    if !cfg.auto_migrate {
        // `Store::open` always brings the schema up to CURRENT_SCHEMA_VERSION,
        // so the refuse-to-start check has to happen before that via a
        // reader connection that never touches the schema.
        let probe = match Store::open_reader(&cfg.db_path, &cfg.pragma) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to open store for schema probe, exiting");
                drop(guard);
                return Err(e);
            }
        };
        match probe.verify_schema() {
            Ok(v) if !v.ok => {
                error!(messages = ?v.messages, "schema out of date and auto-migrate disabled, exiting");
                drop(guard);
                return Err(telemetry_core::Error::Corruption(v.messages.join("; ")));
            }
            Err(e) => {
                error!(error = %e, "schema verification failed, exiting");
                drop(guard);
                return Err(e);
            }
            Ok(_) => {}
        }
    }

    let store = match Store::open(&cfg.db_path, &cfg.pragma) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open store, exiting");
            drop(guard);
            return Err(e);
        }
    };

    let writer = WriterSerializer::new(store);
    let state = AppState::new(writer, &cfg);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .map_err(telemetry_core::Error::Io)?;
    info!(bind_addr = %cfg.bind_addr, "serving");

    let shutdown_grace = cfg.shutdown_grace;
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        error!(error = %e, "server error");
    }

    info!(grace_secs = shutdown_grace.as_secs(), "draining");
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(guard);
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("shutdown signal received, draining in-flight requests");
}
