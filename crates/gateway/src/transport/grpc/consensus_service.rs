// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};

use super::GrpcStream;
use crate::consensus::{KvCommand, KvValue};
use crate::proto::tnc::v1::consensus_service_server::ConsensusService;
use crate::proto::tnc::v1::{
    ClusterConfiguration, ConnectResponse, CreateRequest, CreateResponse, DisconnectResponse,
    GetClusterConfigurationRequest, GetStateRequest, GetStateResponse, NodeRequest, ObserveClusterConfigurationRequest,
    ObserveStateRequest, ProposeRequest, ProposeResponse, StateEvent, StopResponse,
};
use crate::state::Store;

pub struct ConsensusServiceImpl {
    state: Store,
}

impl ConsensusServiceImpl {
    pub fn new(state: Store) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl ConsensusService for ConsensusServiceImpl {
    type ObserveStateStream = GrpcStream<StateEvent>;
    type ObserveClusterConfigurationStream = GrpcStream<ClusterConfiguration>;

    async fn create(&self, request: Request<CreateRequest>) -> Result<Response<CreateResponse>, Status> {
        let req = request.into_inner();
        let id = self.state.consensus.create(&req.cluster).await;
        if req.should_create_cluster {
            self.state.consensus.connect(&id, true).await?;
        }
        Ok(Response::new(CreateResponse { id }))
    }

    async fn connect(&self, request: Request<NodeRequest>) -> Result<Response<ConnectResponse>, Status> {
        let req = request.into_inner();
        self.state.consensus.connect(&req.id, false).await?;
        Ok(Response::new(ConnectResponse { connected: true }))
    }

    async fn disconnect(&self, request: Request<NodeRequest>) -> Result<Response<DisconnectResponse>, Status> {
        let req = request.into_inner();
        self.state.consensus.disconnect(&req.id).await?;
        Ok(Response::new(DisconnectResponse { disconnected: true }))
    }

    async fn stop(&self, request: Request<NodeRequest>) -> Result<Response<StopResponse>, Status> {
        let req = request.into_inner();
        self.state.consensus.stop(&req.id).await?;
        Ok(Response::new(StopResponse { stopped: true }))
    }

    async fn propose(&self, request: Request<ProposeRequest>) -> Result<Response<ProposeResponse>, Status> {
        let req = request.into_inner();
        let value = KvValue::from_wire(req.value)?;
        let response = self.state.consensus.propose(&req.id, KvCommand::Put { key: req.key, value }).await?;
        Ok(Response::new(ProposeResponse { state: response.to_wire_map() }))
    }

    async fn get_state(&self, request: Request<GetStateRequest>) -> Result<Response<GetStateResponse>, Status> {
        let req = request.into_inner();
        let response = self.state.consensus.get_state(&req.id).await?;
        Ok(Response::new(GetStateResponse { state: response.to_wire_map() }))
    }

    async fn observe_state(&self, request: Request<ObserveStateRequest>) -> Result<Response<Self::ObserveStateStream>, Status> {
        let req = request.into_inner();
        let receiver = self.state.consensus.observe_state(&req.id).await?;
        let stream = WatchStream::new(receiver).map(|state| Ok(StateEvent { state: state.to_wire_map() }));
        Ok(Response::new(Box::pin(stream) as Self::ObserveStateStream))
    }

    async fn get_cluster_configuration(
        &self,
        request: Request<GetClusterConfigurationRequest>,
    ) -> Result<Response<ClusterConfiguration>, Status> {
        let req = request.into_inner();
        let members = self.state.consensus.cluster_configuration(&req.id).await?;
        Ok(Response::new(ClusterConfiguration { member_ids: members }))
    }

    async fn observe_cluster_configuration(
        &self,
        request: Request<ObserveClusterConfigurationRequest>,
    ) -> Result<Response<Self::ObserveClusterConfigurationStream>, Status> {
        let req = request.into_inner();
        let receiver = self.state.consensus.observe_cluster_configuration(&req.id).await?;
        let stream = WatchStream::new(receiver).map(|metrics| {
            let member_ids = metrics.membership_config.membership().voter_ids().map(|id| id.to_string()).collect();
            Ok(ClusterConfiguration { member_ids })
        });
        Ok(Response::new(Box::pin(stream) as Self::ObserveClusterConfigurationStream))
    }
}
