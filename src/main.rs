//! mailroom - Entry point for the API server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::Request;
use axum::ServiceExt;
use mailroom::storage::Database;
use mailroom::{router, AppState, Settings};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let settings = Settings::load().context("failed to load settings")?;
    tracing::info!(bind_addr = %settings.server.bind_addr, "Starting mailroom");

    let db = Database::open_url(&settings.database.url)
        .await
        .with_context(|| format!("failed to open database {}", settings.database.url))?;

    let bind_addr = settings.server.bind_addr;
    let autostart = settings.scheduler.autostart;
    let state = Arc::new(AppState::new(db, settings));

    let seeded = state
        .categories
        .initialize_defaults()
        .await
        .context("failed to seed default categories")?;
    tracing::info!(created = seeded, "Default categories ready");

    if autostart {
        let jobs = state.scheduler.start_all().await?;
        tracing::info!(active_jobs = jobs.len(), "Scheduler autostarted");
    }

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "Listening");

    let app = router(Arc::clone(&state));
    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    state.scheduler.shutdown().await;
    tracing::info!("Stopped mailroom");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
