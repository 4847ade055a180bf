// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use uuid::Uuid;

use super::selector::{AgentSelector, DEFAULT_ROLE};
use crate::bus::BusClient;
use crate::error::GwError;
use crate::proto::tnc::v1::{AgentLifecycleEvent, LifecycleEventType};

const REGISTRY_EVENT_CAPACITY: usize = 256;

/// What the tracker knows about one agent presently announced on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub local: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityAnnouncement {
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

#[derive(Debug, Clone)]
enum Change {
    Join(AgentInfo),
    Leave(AgentInfo),
}

/// Tracks agent JOIN/LEAVE transitions observed on `<namespace>/identity/+`.
/// Identity changes (a retained announcement whose name or role differs from
/// what's on file) are surfaced as a LEAVE of the old identity immediately
/// followed by a JOIN of the new one.
#[derive(Clone)]
pub struct LifecycleTracker {
    registry: Arc<RwLock<IndexMap<Uuid, AgentInfo>>>,
    changes: broadcast::Sender<Change>,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(REGISTRY_EVENT_CAPACITY);
        Self {
            registry: Arc::new(RwLock::new(IndexMap::new())),
            changes: tx,
        }
    }
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this tracker to the bus's identity topic namespace and
    /// drive [`Self::handle_identity_message`] off every retained message.
    pub async fn attach(&self, bus: &BusClient, local_id: Uuid) -> Result<(), GwError> {
        let ns = bus.namespace().to_string();
        bus.subscribe_topic(&format!("{ns}/identity/+")).await?;

        let tracker = self.clone();
        let mut events = bus.subscribe_events();
        let prefix = format!("{ns}/identity/");
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(msg) if msg.topic.starts_with(&prefix) => {
                        let Some(id_str) = msg.topic.strip_prefix(&prefix) else { continue };
                        let Ok(id) = Uuid::parse_str(id_str) else { continue };
                        let announcement = if msg.payload.is_empty() {
                            None
                        } else {
                            serde_json::from_slice::<IdentityAnnouncement>(&msg.payload).ok()
                        };
                        tracker.handle_identity_message(id, announcement, id == local_id).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "lifecycle tracker lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(())
    }

    pub async fn handle_identity_message(&self, id: Uuid, announcement: Option<IdentityAnnouncement>, local: bool) {
        let mut registry = self.registry.write().await;
        let previous = registry.get(&id).cloned();

        match announcement {
            None => {
                if let Some(old) = registry.shift_remove(&id) {
                    let _ = self.changes.send(Change::Leave(old));
                }
            }
            Some(ann) => {
                let new_info = AgentInfo { id, name: ann.name, role: ann.role, local };
                if let Some(old) = &previous {
                    if *old == new_info {
                        return;
                    }
                    let _ = self.changes.send(Change::Leave(old.clone()));
                }
                registry.insert(id, new_info.clone());
                let _ = self.changes.send(Change::Join(new_info));
            }
        }
    }

    /// Begin tracking agents matching `selector`: an initial JOIN event per
    /// currently-known matching agent, followed by subsequent matching
    /// transitions for as long as the stream is held open.
    pub async fn track(&self, selector: AgentSelector) -> ReceiverStream<Result<AgentLifecycleEvent, GwError>> {
        let (tx, rx) = tokio::sync::mpsc::channel(REGISTRY_EVENT_CAPACITY);
        let mut changes = self.changes.subscribe();

        let snapshot: Vec<AgentInfo> = self
            .registry
            .read()
            .await
            .values()
            .filter(|a| selector.matches(a))
            .cloned()
            .collect();

        tokio::spawn(async move {
            for agent in snapshot {
                if tx.send(Ok(to_wire(LifecycleEventType::Join, &agent))).await.is_err() {
                    return;
                }
            }
            loop {
                match changes.recv().await {
                    Ok(Change::Join(agent)) if selector.matches(&agent) => {
                        if tx.send(Ok(to_wire(LifecycleEventType::Join, &agent))).await.is_err() {
                            break;
                        }
                    }
                    Ok(Change::Leave(agent)) if selector.matches(&agent) => {
                        if tx.send(Ok(to_wire(LifecycleEventType::Leave, &agent))).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

fn to_wire(kind: LifecycleEventType, agent: &AgentInfo) -> AgentLifecycleEvent {
    AgentLifecycleEvent {
        r#type: kind as i32,
        id: agent.id.to_string(),
        name: agent.name.clone(),
        role: agent.role.clone(),
        local: agent.local,
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
