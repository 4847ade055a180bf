// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A minimal `/healthz`/`/readyz` HTTP surface for process orchestration,
//! independent of the gRPC port.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use crate::bridge::Bridge;

#[derive(Clone)]
struct HealthState {
    bridge: Bridge,
}

pub fn router(bridge: Bridge) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(HealthState { bridge })
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Ready once the bus is connected, or always ready if no bus was configured.
async fn readyz(State(state): State<HealthState>) -> StatusCode {
    if !state.bridge.has_bus().await || state.bridge.is_bus_connected().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    fn bridge() -> Bridge {
        Bridge::new(None, "tnc".to_string(), uuid::Uuid::new_v4(), "Agent".to_string(), None, None, None, None, true, true)
    }

    #[tokio::test]
    async fn healthz_always_ok() {
        let server = TestServer::new(router(bridge())).unwrap();
        let response = server.get("/healthz").await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn readyz_is_ok_without_a_configured_bus() {
        let server = TestServer::new(router(bridge())).unwrap();
        let response = server.get("/readyz").await;
        response.assert_status_ok();
    }
}
