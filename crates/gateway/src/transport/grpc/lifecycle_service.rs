// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};

use super::GrpcStream;
use crate::lifecycle::AgentSelector;
use crate::proto::tnc::v1::lifecycle_service_server::LifecycleService;
use crate::proto::tnc::v1::{AgentLifecycleEvent, AgentSelector as WireAgentSelector};
use crate::state::Store;

pub struct LifecycleServiceImpl {
    state: Store,
}

impl LifecycleServiceImpl {
    pub fn new(state: Store) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl LifecycleService for LifecycleServiceImpl {
    type TrackAgentsStream = GrpcStream<AgentLifecycleEvent>;

    async fn track_agents(&self, request: Request<WireAgentSelector>) -> Result<Response<Self::TrackAgentsStream>, Status> {
        let selector = AgentSelector::from_wire(Some(request.into_inner()))?;
        let stream = self.state.lifecycle.track(selector).await;
        let mapped = stream.map(|item| item.map_err(Status::from));
        Ok(Response::new(Box::pin(mapped) as Self::TrackAgentsStream))
    }
}
