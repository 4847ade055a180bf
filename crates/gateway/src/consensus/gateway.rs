// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::node::RaftNode;
use super::types::{KvCommand, KvResponse, NodeId};
use crate::error::GwError;

/// Multiplexes every `RaftNode` this agent hosts, keyed by the id returned
/// from `Create`. One `ConsensusGateway` exists per gateway process.
#[derive(Clone)]
pub struct ConsensusGateway {
    nodes: Arc<RwLock<HashMap<String, Arc<RaftNode>>>>,
    db_folder: PathBuf,
    self_addr: String,
}

impl ConsensusGateway {
    pub fn new(db_folder: PathBuf, self_addr: String) -> Self {
        Self { nodes: Arc::new(RwLock::new(HashMap::new())), db_folder, self_addr }
    }

    pub async fn create(&self, cluster: &str) -> String {
        let id = NodeId(Uuid::new_v4());
        let node = RaftNode::new(id, cluster, self.db_folder.clone());
        self.nodes.write().await.insert(id.to_string(), node);
        id.to_string()
    }

    async fn node(&self, id: &str) -> Result<Arc<RaftNode>, GwError> {
        self.nodes
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GwError::validation(format!("no consensus node registered under id {id}")))
    }

    /// Locate a node by cluster name rather than by its generated id. Used
    /// by the `RaftTransport` service, whose RPCs only carry the cluster.
    pub async fn node_by_cluster(&self, cluster: &str) -> Result<Arc<RaftNode>, GwError> {
        self.nodes
            .read()
            .await
            .values()
            .find(|n| n.cluster() == cluster)
            .cloned()
            .ok_or_else(|| GwError::validation(format!("no consensus node registered for cluster {cluster}")))
    }

    pub async fn connect(&self, id: &str, should_create_cluster: bool) -> Result<(), GwError> {
        let node = self.node(id).await?;
        node.connect(self.self_addr.clone(), should_create_cluster).await
    }

    pub async fn disconnect(&self, id: &str) -> Result<(), GwError> {
        let node = self.node(id).await?;
        node.disconnect().await
    }

    pub async fn stop(&self, id: &str) -> Result<(), GwError> {
        let node = self.node(id).await?;
        node.stop().await
    }

    pub async fn propose(&self, id: &str, command: KvCommand) -> Result<KvResponse, GwError> {
        let node = self.node(id).await?;
        node.propose(command).await
    }

    pub async fn get_state(&self, id: &str) -> Result<KvResponse, GwError> {
        let node = self.node(id).await?;
        node.read_index_state().await
    }

    pub async fn observe_state(&self, id: &str) -> Result<tokio::sync::watch::Receiver<KvResponse>, GwError> {
        let node = self.node(id).await?;
        Ok(node.observe_state())
    }

    pub async fn cluster_configuration(&self, id: &str) -> Result<Vec<String>, GwError> {
        let node = self.node(id).await?;
        node.cluster_configuration().await
    }

    pub async fn observe_cluster_configuration(
        &self,
        id: &str,
    ) -> Result<tokio::sync::watch::Receiver<openraft::RaftMetrics<NodeId, openraft::BasicNode>>, GwError> {
        let node = self.node(id).await?;
        node.observe_cluster_configuration().await
    }
}
