//! al-server: HTTP API, live session management, and the segment store.
//!
//! This crate ties the other al-* crates into a running server. It provides:
//!
//! - A [`SegmentStore`](store::SegmentStore) holding one rolling HLS window
//!   per content fingerprint
//! - A [`LiveController`](controller::LiveController) that launches and
//!   supervises one transcoder per fingerprint
//! - A [`SessionRegistry`](registry::SessionRegistry) guaranteeing at most
//!   one live transcoder per fingerprint under concurrent requests
//! - An idle reaper and graceful shutdown that stop abandoned transcoders

pub mod context;
pub mod controller;
pub mod error;
pub mod reaper;
pub mod registry;
pub mod router;
pub mod routes;
pub mod session;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use al_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the acelive server.
///
/// Builds the [`AppContext`], spawns the idle reaper and serves HTTP until a
/// shutdown signal arrives. Every live transcoder is stopped before this
/// returns.
pub async fn start(config: Config) -> al_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    // Discover external tools.
    let tools = Arc::new(al_av::ToolRegistry::discover(&config.tools));
    for info in tools.check_all().await {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; conversions will fail", info.name);
        }
    }

    std::fs::create_dir_all(&config.live.store_root)?;
    tracing::info!("Segment store at {}", config.live.store_root.display());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| al_core::Error::Validation(format!("Invalid server address: {e}")))?;
    let static_dir = config.server.static_dir.clone();

    let ctx = AppContext::new(config, tools);
    let purged = ctx.store().purge_detached();
    if purged > 0 {
        tracing::info!(count = purged, "Deleted leftover store directories");
    }

    let cancel = CancellationToken::new();

    let reaper_handle = match ctx.config.live.idle_timeout() {
        Some(idle_timeout) if ctx.config.live.reap_interval_secs > 0 => {
            Some(reaper::start_idle_reaper(
                ctx.registry.clone(),
                Duration::from_secs(ctx.config.live.reap_interval_secs),
                idle_timeout,
                cancel.clone(),
            ))
        }
        _ => {
            tracing::info!("Idle session reaping disabled");
            None
        }
    };

    let app = router::build_router(ctx.clone(), static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| al_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Listening on {addr}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    // Stop background work whichever way the server ended.
    cancel.cancel();
    if let Some(handle) = reaper_handle {
        let _ = handle.await;
    }
    ctx.registry.shutdown().await;

    served.map_err(|e| al_core::Error::Internal(format!("Server error: {e}")))?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
