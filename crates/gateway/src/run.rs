// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level gateway runner — shared by `main` and integration tests.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::Store;

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the gateway to completion, returning once a shutdown signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);

    let shutdown = CancellationToken::new();
    let store = Store::new(&config);

    if config.bus_autostart() {
        store.bridge.ensure_connected().await?;
        if let Ok(bus) = store.bridge.bus_for_lifecycle().await {
            store.lifecycle.attach(&bus, store.agent_id()).await?;
        }
    }

    let grpc_addr = format!("0.0.0.0:{}", config.grpc_port).parse()?;
    {
        let router = crate::transport::grpc::into_router(store.clone());
        let sd = shutdown.clone();
        info!("gRPC listening on {grpc_addr}");
        tokio::spawn(async move {
            let result = router.serve_with_shutdown(grpc_addr, sd.cancelled_owned()).await;
            if let Err(e) = result {
                error!("gRPC server error: {e}");
            }
        });
    }

    if let Some(health_port) = config.health_port {
        let health_router = crate::health::router(store.bridge.clone());
        let addr = format!("0.0.0.0:{health_port}");
        let listener = TcpListener::bind(&addr).await?;
        info!("health probe listening on {addr}");
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, health_router).with_graceful_shutdown(sd.cancelled_owned()).await;
            if let Err(e) = result {
                error!("health server error: {e}");
            }
        });
    }

    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
            let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGTERM");
                }
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGINT");
                }
            }
            sd.cancel();
        });
    }

    shutdown.cancelled().await;
    let _ = store.bridge.clear_identity().await;
    Ok(())
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
