// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::PathBuf;

use openraft::storage::{LogState, Snapshot};
use openraft::{
    Entry, LogId, OptionalSend, RaftLogReader, RaftSnapshotBuilder, RaftStorage, SnapshotMeta, StorageError,
    StoredMembership, Vote,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::{KvCommand, KvResponse, NodeId, TncTypeConfig};

/// The durable record written to `<db_folder>/raft-<node-id>.json` after
/// every vote, log append, and state machine apply.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Record {
    vote: Option<Vote<NodeId>>,
    committed: Option<LogId<NodeId>>,
    log: BTreeMap<u64, Entry<TncTypeConfig>>,
    last_applied: Option<LogId<NodeId>>,
    last_membership: StoredMembership<NodeId, openraft::BasicNode>,
    state_machine: KvResponse,
}

/// In-memory Raft log and state machine backed by a JSON file per node,
/// bridged into openraft's split log/state-machine interface via
/// [`openraft::storage::Adaptor`].
pub struct MemStore {
    record: Record,
    db_path: PathBuf,
    current_snapshot: Option<Snapshot<TncTypeConfig>>,
    state_tx: Option<tokio::sync::watch::Sender<KvResponse>>,
}

impl MemStore {
    pub fn new(db_folder: &std::path::Path, node_id: NodeId) -> Self {
        Self::with_state_watch(db_folder, node_id, None)
    }

    /// Like [`Self::new`], but also pushes every applied state machine
    /// change onto `state_tx` so callers outside the Raft core (e.g.
    /// `ObserveState`) can watch it regardless of whether the change
    /// originated from a local write or replication from the leader.
    pub fn with_state_watch(
        db_folder: &std::path::Path,
        node_id: NodeId,
        state_tx: Option<tokio::sync::watch::Sender<KvResponse>>,
    ) -> Self {
        let db_path = db_folder.join(format!("raft-{node_id}.json"));
        let record: Record = std::fs::read(&db_path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        if let Some(tx) = &state_tx {
            let _ = tx.send(record.state_machine.clone());
        }
        Self { record, db_path, current_snapshot: None, state_tx }
    }

    async fn persist(&self) {
        match serde_json::to_vec_pretty(&self.record) {
            Ok(bytes) => {
                if let Err(err) = tokio::fs::write(&self.db_path, bytes).await {
                    warn!(path = %self.db_path.display(), error = %err, "failed to persist raft record");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize raft record"),
        }
    }

    /// Delete the persisted record file. Used by `Disconnect`, which drops
    /// this node's database entirely.
    pub async fn delete_persisted(&self) {
        let _ = tokio::fs::remove_file(&self.db_path).await;
    }
}

impl RaftLogReader<TncTypeConfig> for MemStore {
    async fn try_get_log_entries<RB: std::ops::RangeBounds<u64> + Clone + std::fmt::Debug + OptionalSend>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TncTypeConfig>>, StorageError<NodeId>> {
        Ok(self.record.log.range(range).map(|(_, v)| v.clone()).collect())
    }
}

impl RaftSnapshotBuilder<TncTypeConfig> for MemStore {
    async fn build_snapshot(&mut self) -> Result<Snapshot<TncTypeConfig>, StorageError<NodeId>> {
        let data = serde_json::to_vec(&self.record.state_machine).unwrap_or_default();
        let meta = SnapshotMeta {
            last_log_id: self.record.last_applied,
            last_membership: self.record.last_membership.clone(),
            snapshot_id: format!("{:?}-{:?}", self.record.last_applied, self.record.committed),
        };
        let snapshot = Snapshot { meta: meta.clone(), snapshot: Box::new(Cursor::new(data)) };
        self.current_snapshot = Some(Snapshot { meta, snapshot: Box::new(Cursor::new(serde_json::to_vec(&self.record.state_machine).unwrap_or_default())) });
        Ok(snapshot)
    }
}

impl RaftStorage<TncTypeConfig> for MemStore {
    type LogReader = Self;
    type SnapshotBuilder = Self;

    async fn save_vote(&mut self, vote: &Vote<NodeId>) -> Result<(), StorageError<NodeId>> {
        self.record.vote = Some(*vote);
        self.persist().await;
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<NodeId>>, StorageError<NodeId>> {
        Ok(self.record.vote)
    }

    async fn save_committed(&mut self, committed: Option<LogId<NodeId>>) -> Result<(), StorageError<NodeId>> {
        self.record.committed = committed;
        self.persist().await;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<LogId<NodeId>>, StorageError<NodeId>> {
        Ok(self.record.committed)
    }

    async fn get_log_state(&mut self) -> Result<LogState<TncTypeConfig>, StorageError<NodeId>> {
        let last = self.record.log.values().next_back().map(|e| e.log_id);
        Ok(LogState {
            last_purged_log_id: None,
            last_log_id: last,
        })
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        MemStore { record: Record::default(), db_path: self.db_path.clone(), current_snapshot: None, state_tx: None }
    }

    async fn append_to_log<I>(&mut self, entries: I) -> Result<(), StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TncTypeConfig>> + Send,
    {
        for entry in entries {
            self.record.log.insert(entry.log_id.index, entry);
        }
        self.persist().await;
        Ok(())
    }

    async fn delete_conflict_logs_since(&mut self, log_id: LogId<NodeId>) -> Result<(), StorageError<NodeId>> {
        self.record.log.split_off(&log_id.index);
        self.persist().await;
        Ok(())
    }

    async fn purge_logs_upto(&mut self, log_id: LogId<NodeId>) -> Result<(), StorageError<NodeId>> {
        self.record.log.retain(|idx, _| *idx > log_id.index);
        self.persist().await;
        Ok(())
    }

    async fn last_applied_state(
        &mut self,
    ) -> Result<(Option<LogId<NodeId>>, StoredMembership<NodeId, openraft::BasicNode>), StorageError<NodeId>> {
        Ok((self.record.last_applied, self.record.last_membership.clone()))
    }

    async fn apply_to_state_machine(&mut self, entries: &[Entry<TncTypeConfig>]) -> Result<Vec<KvResponse>, StorageError<NodeId>> {
        let mut responses = Vec::with_capacity(entries.len());
        for entry in entries {
            self.record.last_applied = Some(entry.log_id);
            if let openraft::EntryPayload::Normal(KvCommand::Put { key, value }) = &entry.payload {
                self.record.state_machine.state.insert(key.clone(), value.clone());
            }
            if let openraft::EntryPayload::Membership(ref membership) = entry.payload {
                self.record.last_membership = StoredMembership::new(Some(entry.log_id), membership.clone());
            }
            responses.push(self.record.state_machine.clone());
        }
        if let Some(tx) = &self.state_tx {
            let _ = tx.send(self.record.state_machine.clone());
        }
        self.persist().await;
        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        MemStore { record: self.record.clone(), db_path: self.db_path.clone(), current_snapshot: None, state_tx: None }
    }

    async fn begin_receiving_snapshot(&mut self) -> Result<Box<Cursor<Vec<u8>>>, StorageError<NodeId>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<NodeId, openraft::BasicNode>,
        snapshot: Box<Cursor<Vec<u8>>>,
    ) -> Result<(), StorageError<NodeId>> {
        let state: KvResponse = serde_json::from_slice(snapshot.get_ref()).unwrap_or_default();
        self.record.state_machine = state;
        self.record.last_applied = meta.last_log_id;
        self.record.last_membership = meta.last_membership.clone();
        self.record.log.clear();
        self.current_snapshot = Some(Snapshot { meta: meta.clone(), snapshot });
        if let Some(tx) = &self.state_tx {
            let _ = tx.send(self.record.state_machine.clone());
        }
        self.persist().await;
        Ok(())
    }

    async fn get_current_snapshot(&mut self) -> Result<Option<Snapshot<TncTypeConfig>>, StorageError<NodeId>> {
        Ok(self.current_snapshot.take().map(|s| {
            let cloned = Snapshot {
                meta: s.meta.clone(),
                snapshot: Box::new(Cursor::new(s.snapshot.get_ref().clone())),
            };
            self.current_snapshot = Some(s);
            cloned
        }))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
