//! `imgfilter serve` – run the HTTP server until Ctrl-C / SIGTERM.

use anyhow::{Context, Result};
use imgfilter_core::config::ServerConfig;
use std::time::Duration;
use tokio::signal;

use super::build_pipeline;
use crate::routes;

pub async fn run_serve(cfg: &ServerConfig) -> Result<()> {
    let (pipeline, store) = build_pipeline(cfg)?;

    let swept = store.sweep_stale(Duration::from_secs(cfg.sweep_after_secs));
    if swept > 0 {
        tracing::info!(swept, dir = %store.dir().display(), "removed stale artifacts");
    }

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    tracing::info!("server running http://localhost:{}", cfg.port);
    tracing::info!("press CTRL+C to stop server");

    axum::serve(listener, routes::router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
