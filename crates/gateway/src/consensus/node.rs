// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use openraft::storage::Adaptor;
use openraft::{BasicNode, Raft};
use tokio::sync::{watch, RwLock};

use super::error::{translate_client_write_error, ConnectionFault};
use super::network::GrpcNetworkFactory;
use super::store::MemStore;
use super::types::{KvCommand, KvResponse, NodeId, TncTypeConfig};
use crate::error::GwError;

/// The lifecycle of one Raft node's network participation, independent of
/// whether the underlying Raft core is currently leader, follower, or
/// candidate. Operations outside `Connected` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Stopping,
    Stopped,
}

impl ConnectionState {
    fn name(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
            Self::Disconnected => "Disconnected",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        }
    }
}

type TncRaft = Raft<TncTypeConfig>;

/// Upper bound on proposals concurrently in flight through `client_write`
/// for one node, past which `propose` rejects new work with backpressure
/// rather than growing the in-memory queue unbounded.
const MAX_QUEUED_PROPOSALS: usize = 1000;

/// Decrements the in-flight proposal counter on drop, so a proposal that
/// returns early (error or otherwise) doesn't leak its reserved slot.
struct ProposalSlot<'a>(&'a AtomicUsize);

impl Drop for ProposalSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One named Raft node owned by this gateway, bridging `ConsensusService`
/// operations onto an `openraft::Raft` instance.
pub struct RaftNode {
    pub id: NodeId,
    cluster: String,
    db_folder: PathBuf,
    state: RwLock<ConnectionState>,
    raft: RwLock<Option<TncRaft>>,
    state_tx: watch::Sender<KvResponse>,
    in_flight_proposals: AtomicUsize,
}

impl RaftNode {
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Directly deliver a peer's Raft RPC to this node's core. Used by the
    /// `RaftTransport` gRPC service, not by outgoing `GrpcNetwork` calls.
    pub async fn raft_handle(&self) -> Result<TncRaft, GwError> {
        self.raft
            .read()
            .await
            .clone()
            .ok_or_else(|| ConnectionFault::OperationNotSupportedInCurrentConnectionState("not connected").into())
    }

    pub fn new(id: NodeId, cluster: impl Into<String>, db_folder: PathBuf) -> Arc<Self> {
        let (state_tx, _rx) = watch::channel(KvResponse::default());
        Arc::new(Self {
            id,
            cluster: cluster.into(),
            db_folder,
            state: RwLock::new(ConnectionState::Created),
            raft: RwLock::new(None),
            state_tx,
            in_flight_proposals: AtomicUsize::new(0),
        })
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Start the Raft core and, if `should_create_cluster`, initialize a
    /// fresh single-member cluster once the storage is wired up.
    pub async fn connect(&self, self_addr: String, should_create_cluster: bool) -> Result<(), GwError> {
        {
            let mut state = self.state.write().await;
            match *state {
                ConnectionState::Created | ConnectionState::Disconnected => *state = ConnectionState::Connecting,
                other => return Err(ConnectionFault::OperationNotSupportedInCurrentConnectionState(other.name()).into()),
            }
        }

        let storage = MemStore::with_state_watch(&self.db_folder, self.id, Some(self.state_tx.clone()));
        let (log_store, state_machine) = Adaptor::new(storage);
        let network = GrpcNetworkFactory::new(self.cluster.clone());
        let config = Arc::new(openraft::Config::default().validate().map_err(|e| GwError::internal(e.to_string()))?);

        let raft = TncRaft::new(self.id, config, network, log_store, state_machine)
            .await
            .map_err(|e| GwError::internal(format!("failed to start raft core: {e}")))?;

        if should_create_cluster {
            let mut members = BTreeMap::new();
            members.insert(self.id, BasicNode { addr: self_addr });
            raft.initialize(members)
                .await
                .map_err(|e| GwError::internal(format!("failed to initialize cluster: {e}")))?;
        }

        *self.raft.write().await = Some(raft);
        *self.state.write().await = ConnectionState::Connected;
        Ok(())
    }

    /// Disconnects and deletes this node's persisted database, per the
    /// distinction from `stop` (which retains it).
    pub async fn disconnect(&self) -> Result<(), GwError> {
        {
            let mut state = self.state.write().await;
            match *state {
                ConnectionState::Connected => *state = ConnectionState::Disconnecting,
                other => return Err(ConnectionFault::OperationNotSupportedInCurrentConnectionState(other.name()).into()),
            }
        }
        if let Some(raft) = self.raft.write().await.take() {
            let _ = raft.shutdown().await;
        }
        MemStore::with_state_watch(&self.db_folder, self.id, None).delete_persisted().await;
        *self.state.write().await = ConnectionState::Disconnected;
        Ok(())
    }

    /// Stops the Raft core while retaining the persisted database so the
    /// node can later be reconnected from where it left off.
    pub async fn stop(&self) -> Result<(), GwError> {
        {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Stopped {
                return Ok(());
            }
            *state = ConnectionState::Stopping;
        }
        if let Some(raft) = self.raft.write().await.take() {
            let _ = raft.shutdown().await;
        }
        *self.state.write().await = ConnectionState::Stopped;
        Ok(())
    }

    pub async fn propose(&self, command: KvCommand) -> Result<KvResponse, GwError> {
        let raft = self.raft.read().await;
        let Some(raft) = raft.as_ref() else {
            return Err(ConnectionFault::OperationNotSupportedInCurrentConnectionState(
                self.connection_state().await.name(),
            )
            .into());
        };

        if self.in_flight_proposals.fetch_add(1, Ordering::SeqCst) >= MAX_QUEUED_PROPOSALS {
            self.in_flight_proposals.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionFault::TooManyQueuedUpInputProposals.into());
        }
        let _slot = ProposalSlot(&self.in_flight_proposals);

        let response = raft.client_write(command).await.map_err(translate_client_write_error)?;
        Ok(response.data)
    }

    /// Propose an internal no-op and return the resulting state. Because the
    /// no-op round-trips through the same log as every other write, the
    /// returned state is guaranteed to reflect everything committed up to
    /// the moment of the call, unlike a cached watch read which may be
    /// stale relative to a write that just landed on another node.
    pub async fn read_index_state(&self) -> Result<KvResponse, GwError> {
        self.propose(KvCommand::Noop).await
    }

    pub fn observe_state(&self) -> watch::Receiver<KvResponse> {
        self.state_tx.subscribe()
    }

    pub async fn cluster_configuration(&self) -> Result<Vec<String>, GwError> {
        let raft = self.raft.read().await;
        let Some(raft) = raft.as_ref() else {
            return Err(ConnectionFault::OperationNotSupportedInCurrentConnectionState(
                self.connection_state().await.name(),
            )
            .into());
        };
        let metrics = raft.metrics().borrow().clone();
        Ok(metrics
            .membership_config
            .membership()
            .voter_ids()
            .map(|id| id.to_string())
            .collect())
    }

    pub async fn observe_cluster_configuration(&self) -> Result<watch::Receiver<openraft::RaftMetrics<NodeId, BasicNode>>, GwError> {
        let raft = self.raft.read().await;
        let Some(raft) = raft.as_ref() else {
            return Err(ConnectionFault::OperationNotSupportedInCurrentConnectionState(
                self.connection_state().await.name(),
            )
            .into());
        };
        Ok(raft.metrics())
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
