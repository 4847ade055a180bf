// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use openraft::error::{InstallSnapshotError, NetworkError, RPCError, RaftError, RemoteError};
use openraft::network::{RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse, VoteRequest,
    VoteResponse,
};
use openraft::BasicNode;

use super::types::{NodeId, TncTypeConfig};
use crate::proto::tnc::v1::raft_transport_client::RaftTransportClient;
use crate::proto::tnc::v1::RaftRpc;

/// Connects to one peer's `RaftTransport` gRPC service and carries Raft RPCs
/// as JSON-serialized bytes, the way the teacher's own service bridges carry
/// cross-process calls.
pub struct GrpcNetwork {
    cluster: String,
    addr: String,
}

impl GrpcNetwork {
    async fn client(&self) -> Result<RaftTransportClient<tonic::transport::Channel>, tonic::transport::Error> {
        RaftTransportClient::connect(self.addr.clone()).await
    }
}

impl RaftNetwork<TncTypeConfig> for GrpcNetwork {
    async fn append_entries(
        &mut self,
        req: AppendEntriesRequest<TncTypeConfig>,
        _option: openraft::network::RPCOption,
    ) -> Result<AppendEntriesResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        let payload = serde_json::to_vec(&req).map_err(|e| RPCError::Network(NetworkError::new(&e)))?;
        let mut client = self.client().await.map_err(|e| RPCError::Network(NetworkError::new(&e)))?;
        let response = client
            .append_entries(RaftRpc { cluster: self.cluster.clone(), payload })
            .await
            .map_err(|e| RPCError::RemoteError(RemoteError::new(NodeId::default(), RaftError::Fatal(e.into()))))?;
        serde_json::from_slice(&response.into_inner().payload).map_err(|e| RPCError::Network(NetworkError::new(&e)))
    }

    async fn install_snapshot(
        &mut self,
        req: InstallSnapshotRequest<TncTypeConfig>,
        _option: openraft::network::RPCOption,
    ) -> Result<InstallSnapshotResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId, InstallSnapshotError>>> {
        let payload = serde_json::to_vec(&req).map_err(|e| RPCError::Network(NetworkError::new(&e)))?;
        let mut client = self.client().await.map_err(|e| RPCError::Network(NetworkError::new(&e)))?;
        let response = client
            .install_snapshot(RaftRpc { cluster: self.cluster.clone(), payload })
            .await
            .map_err(|e| RPCError::RemoteError(RemoteError::new(NodeId::default(), RaftError::Fatal(e.into()))))?;
        serde_json::from_slice(&response.into_inner().payload).map_err(|e| RPCError::Network(NetworkError::new(&e)))
    }

    async fn vote(
        &mut self,
        req: VoteRequest<NodeId>,
        _option: openraft::network::RPCOption,
    ) -> Result<VoteResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        let payload = serde_json::to_vec(&req).map_err(|e| RPCError::Network(NetworkError::new(&e)))?;
        let mut client = self.client().await.map_err(|e| RPCError::Network(NetworkError::new(&e)))?;
        let response = client
            .vote(RaftRpc { cluster: self.cluster.clone(), payload })
            .await
            .map_err(|e| RPCError::RemoteError(RemoteError::new(NodeId::default(), RaftError::Fatal(e.into()))))?;
        serde_json::from_slice(&response.into_inner().payload).map_err(|e| RPCError::Network(NetworkError::new(&e)))
    }
}

/// Builds a fresh [`GrpcNetwork`] per target node, as openraft requires.
pub struct GrpcNetworkFactory {
    cluster: String,
}

impl GrpcNetworkFactory {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self { cluster: cluster.into() }
    }
}

impl RaftNetworkFactory<TncTypeConfig> for GrpcNetworkFactory {
    type Network = GrpcNetwork;

    async fn new_client(&mut self, _target: NodeId, node: &BasicNode) -> Self::Network {
        GrpcNetwork { cluster: self.cluster.clone(), addr: node.addr.clone() }
    }
}
