// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tonic::{Request, Response, Status};

use crate::consensus::TncTypeConfig;
use crate::proto::tnc::v1::raft_transport_server::RaftTransport;
use crate::proto::tnc::v1::RaftRpc;
use crate::state::Store;

/// The inter-node transport surface carrying Raft's own RPCs (append
/// entries, vote, install snapshot) between gateway instances, JSON-encoded
/// inside an opaque `bytes` field. Single-node clusters never receive
/// traffic on this service.
pub struct RaftTransportImpl {
    state: Store,
}

impl RaftTransportImpl {
    pub fn new(state: Store) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl RaftTransport for RaftTransportImpl {
    async fn append_entries(&self, request: Request<RaftRpc>) -> Result<Response<RaftRpc>, Status> {
        let req = request.into_inner();
        let node = self.state.consensus.node_by_cluster(&req.cluster).await?;
        let raft = node.raft_handle().await?;
        let append_req: openraft::raft::AppendEntriesRequest<TncTypeConfig> =
            serde_json::from_slice(&req.payload).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let response = raft
            .append_entries(append_req)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        let payload = serde_json::to_vec(&response).map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(RaftRpc { cluster: req.cluster, payload }))
    }

    async fn vote(&self, request: Request<RaftRpc>) -> Result<Response<RaftRpc>, Status> {
        let req = request.into_inner();
        let node = self.state.consensus.node_by_cluster(&req.cluster).await?;
        let raft = node.raft_handle().await?;
        let vote_req = serde_json::from_slice(&req.payload).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let response = raft.vote(vote_req).await.map_err(|e| Status::internal(e.to_string()))?;
        let payload = serde_json::to_vec(&response).map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(RaftRpc { cluster: req.cluster, payload }))
    }

    async fn install_snapshot(&self, request: Request<RaftRpc>) -> Result<Response<RaftRpc>, Status> {
        let req = request.into_inner();
        let node = self.state.consensus.node_by_cluster(&req.cluster).await?;
        let raft = node.raft_handle().await?;
        let snapshot_req: openraft::raft::InstallSnapshotRequest<TncTypeConfig> =
            serde_json::from_slice(&req.payload).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let response = raft
            .install_snapshot(snapshot_req)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        let payload = serde_json::to_vec(&response).map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(RaftRpc { cluster: req.cluster, payload }))
    }
}
