// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `tnc-gateway` binary and
//! exercise it over its gRPC and health ports.

use std::time::Duration;

use tncgw::proto::tnc::v1::consensus_service_client::ConsensusServiceClient;
use tncgw::proto::tnc::v1::lifecycle_service_client::LifecycleServiceClient;
use tncgw::proto::tnc::v1::routing_service_client::RoutingServiceClient;
use tncgw::proto::tnc::v1::{
    k_v_value, AgentSelector, CreateRequest, KvValue, NodeRequest, Payload, ProposeRequest, PushEvent, PushRoute,
};
use tncgw_specs::GatewayProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

async fn connect(url: &str) -> anyhow::Result<tonic::transport::Channel> {
    Ok(tonic::transport::Channel::from_shared(url.to_string())?.connect().await?)
}

#[tokio::test]
async fn health_port_reports_ok() -> anyhow::Result<()> {
    let gateway = GatewayProcess::build().health().spawn()?;
    gateway.wait_ready(TIMEOUT).await?;

    let (status, _) = tncgw_specs::http_get(gateway.health_port().unwrap(), "/healthz").await?;
    assert_eq!(status, 200);

    let (status, _) = tncgw_specs::http_get(gateway.health_port().unwrap(), "/readyz").await?;
    assert_eq!(status, 200);

    Ok(())
}

#[tokio::test]
async fn routing_push_reaches_registered_stream() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start()?;
    gateway.wait_ready(TIMEOUT).await?;

    let channel = connect(&gateway.grpc_url()).await?;
    let mut client = RoutingServiceClient::new(channel.clone());

    let mut stream = client
        .register_push_route(PushRoute { route: "smoke.push".into() })
        .await?
        .into_inner();

    let mut pusher = RoutingServiceClient::new(channel);
    let ack = pusher
        .push(PushEvent {
            route: "smoke.push".into(),
            payload: Some(Payload { type_url: "text".into(), value: b"hello".to_vec() }),
        })
        .await?
        .into_inner();
    assert_eq!(ack.routing_count, 1);

    let event = tokio::time::timeout(TIMEOUT, stream.message())
        .await??
        .ok_or_else(|| anyhow::anyhow!("push stream ended early"))?;
    assert_eq!(event.payload.unwrap().value, b"hello");

    Ok(())
}

#[tokio::test]
async fn lifecycle_tracks_local_agent_by_default_role() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start()?;
    gateway.wait_ready(TIMEOUT).await?;

    let channel = connect(&gateway.grpc_url()).await?;
    let mut client = LifecycleServiceClient::new(channel);

    // With no bus configured there is no identity announcement to observe;
    // the stream should simply stay open rather than error.
    let mut stream = client
        .track_agents(AgentSelector { selector: None })
        .await?
        .into_inner();

    let result = tokio::time::timeout(Duration::from_millis(200), stream.message()).await;
    assert!(result.is_err(), "expected no lifecycle events without a configured bus");

    Ok(())
}

#[tokio::test]
async fn consensus_single_node_cluster_accepts_proposals() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start()?;
    gateway.wait_ready(TIMEOUT).await?;

    let channel = connect(&gateway.grpc_url()).await?;
    let mut client = ConsensusServiceClient::new(channel);

    let created = client
        .create(CreateRequest { cluster: "smoke".into(), should_create_cluster: true })
        .await?
        .into_inner();

    client.connect(NodeRequest { id: created.id.clone() }).await?;

    let response = client
        .propose(ProposeRequest {
            id: created.id.clone(),
            key: "answer".into(),
            value: Some(KvValue { kind: Some(k_v_value::Kind::NumberValue(42.0)) }),
        })
        .await?
        .into_inner();

    match response.state.get("answer").and_then(|v| v.kind.clone()) {
        Some(k_v_value::Kind::NumberValue(n)) => assert_eq!(n, 42.0),
        other => anyhow::bail!("unexpected state entry: {other:?}"),
    }

    Ok(())
}
