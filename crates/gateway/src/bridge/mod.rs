// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bus communication bridge: `Channel` (one-way multicast) and
//! `Call`/`Return`/`Complete` event patterns layered on top of [`BusClient`].

mod envelope;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, watch, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use uuid::Uuid;

pub use envelope::{CallEnvelope, CompleteEnvelope, ReturnEnvelope};

use crate::bus::{topics, BusClient, BusSettings};
use crate::codec::BusPayload;
use crate::error::GwError;
use crate::proto::tnc::v1::{CallEvent, ChannelEvent, Payload, ReturnEvent};

const STREAM_BUFFER: usize = 64;

/// Agent identity as currently configured on this bridge.
#[derive(Debug, Clone)]
pub struct Identity {
    pub agent_id: Uuid,
    pub agent_name: String,
}

#[derive(Clone)]
struct BridgeConfig {
    bus_url: Option<String>,
    namespace: String,
    identity: Identity,
    username: Option<String>,
    password: Option<String>,
    tls_cert: Option<String>,
    tls_key: Option<String>,
    tls_verify: bool,
    fail_fast_override: Option<bool>,
}

/// A bus-side response target registered for one inbound Call event
/// observed via [`Bridge::observe_call`]. Keyed by a correlation id that is
/// opaque to the gRPC caller and distinct from the bus-level correlation
/// carried on the wire; removed on `PublishComplete` or when the observing
/// stream itself ends.
struct ResponseSink {
    operation: String,
    bus_correlation_id: Uuid,
}

/// Shared bridge state. One instance per gateway process; every
/// `CommunicationService` RPC operates against the same bus connection.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<RwLock<BridgeInner>>,
    default_fail_fast: bool,
    generation: watch::Sender<u64>,
    sinks: Arc<StdMutex<HashMap<Uuid, ResponseSink>>>,
}

struct BridgeInner {
    config: BridgeConfig,
    bus: Option<BusClient>,
}

/// Releases every [`ResponseSink`] a single `ObserveCall` stream registered
/// once that stream ends, so a departed observer can't leave live sinks
/// behind for `PublishReturn`/`PublishComplete` to keep matching against.
struct SinkGuard {
    sinks: Arc<StdMutex<HashMap<Uuid, ResponseSink>>>,
    owned: Vec<Uuid>,
}

impl SinkGuard {
    fn new(sinks: Arc<StdMutex<HashMap<Uuid, ResponseSink>>>) -> Self {
        Self { sinks, owned: Vec::new() }
    }

    fn register(&mut self, operation: String, bus_correlation_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.sinks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, ResponseSink { operation, bus_correlation_id });
        self.owned.push(id);
        id
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        for id in &self.owned {
            sinks.remove(id);
        }
    }
}

impl Bridge {
    pub fn new(
        bus_url: Option<String>,
        namespace: String,
        agent_id: Uuid,
        agent_name: String,
        username: Option<String>,
        password: Option<String>,
        tls_cert: Option<String>,
        tls_key: Option<String>,
        tls_verify: bool,
        default_fail_fast: bool,
    ) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(BridgeInner {
                config: BridgeConfig {
                    bus_url,
                    namespace,
                    identity: Identity { agent_id, agent_name },
                    username,
                    password,
                    tls_cert,
                    tls_key,
                    tls_verify,
                    fail_fast_override: None,
                },
                bus: None,
            })),
            default_fail_fast,
            generation,
            sinks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Establish the bus connection if one isn't already active. Called at
    /// startup when `bus_autostart` is true.
    pub async fn ensure_connected(&self) -> Result<(), GwError> {
        let mut inner = self.inner.write().await;
        if inner.bus.is_some() {
            return Ok(());
        }
        let Some(url) = inner.config.bus_url.clone() else {
            return Ok(());
        };
        inner.bus = Some(self.connect_with(&inner.config, &url)?);
        drop(inner);
        self.publish_identity().await?;
        Ok(())
    }

    /// Announce this agent's identity as a retained message so late-joining
    /// lifecycle trackers still observe it via their initial JOIN snapshot.
    pub async fn publish_identity(&self) -> Result<(), GwError> {
        let bus = match self.bus().await {
            Ok(bus) => bus,
            Err(_) => return Ok(()),
        };
        let ns = self.namespace().await;
        let identity = self.identity().await;
        let announcement = crate::lifecycle::IdentityAnnouncement {
            name: identity.agent_name,
            role: crate::lifecycle::DEFAULT_ROLE.to_string(),
        };
        let bytes = serde_json::to_vec(&announcement).map_err(|e| GwError::internal(format!("encode identity: {e}")))?;
        bus.publish(&topics::identity(&ns, &identity.agent_id.to_string()), bytes, true).await
    }

    /// Clear this agent's retained identity, causing trackers to observe a
    /// LEAVE. Called during graceful shutdown.
    pub async fn clear_identity(&self) -> Result<(), GwError> {
        let bus = match self.bus().await {
            Ok(bus) => bus,
            Err(_) => return Ok(()),
        };
        let ns = self.namespace().await;
        let identity = self.identity().await;
        bus.publish(&topics::identity(&ns, &identity.agent_id.to_string()), Vec::new(), true).await
    }

    fn connect_with(&self, config: &BridgeConfig, url: &str) -> Result<BusClient, GwError> {
        BusClient::connect(BusSettings {
            url: url.to_string(),
            namespace: config.namespace.clone(),
            client_id: config.identity.agent_id.to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            tls_cert: config.tls_cert.clone(),
            tls_key: config.tls_key.clone(),
            tls_verify: config.tls_verify,
        })
    }

    /// Apply a `Configure` request. Reconnects the bus when connection
    /// parameters change, reports whether the agent identity changed, and
    /// always bumps the reconfiguration generation so every live
    /// observation/publish stream ends cleanly rather than erroring.
    #[allow(clippy::too_many_arguments)]
    pub async fn configure(
        &self,
        bus_url: Option<String>,
        namespace: Option<String>,
        agent_name: Option<String>,
        agent_id: Option<Uuid>,
        username: Option<String>,
        password: Option<String>,
        fail_fast_if_offline: Option<bool>,
    ) -> Result<(bool, bool), GwError> {
        let mut inner = self.inner.write().await;
        let old_identity = inner.config.identity.clone();

        let mut connection_changed = false;
        if let Some(url) = bus_url {
            if inner.config.bus_url.as_deref() != Some(url.as_str()) {
                inner.config.bus_url = Some(url);
                connection_changed = true;
            }
        }
        if let Some(ns) = namespace {
            if inner.config.namespace != ns {
                inner.config.namespace = ns;
                connection_changed = true;
            }
        }
        if let Some(user) = username {
            inner.config.username = Some(user);
            connection_changed = true;
        }
        if let Some(pass) = password {
            inner.config.password = Some(pass);
            connection_changed = true;
        }
        if let Some(name) = agent_name {
            inner.config.identity.agent_name = name;
        }
        if let Some(id) = agent_id {
            inner.config.identity.agent_id = id;
        }
        if fail_fast_if_offline.is_some() {
            inner.config.fail_fast_override = fail_fast_if_offline;
        }

        let identity_changed = old_identity.agent_id != inner.config.identity.agent_id
            || old_identity.agent_name != inner.config.identity.agent_name;

        let mut restarted = false;
        if connection_changed {
            if let Some(url) = inner.config.bus_url.clone() {
                inner.bus = Some(self.connect_with(&inner.config, &url)?);
                restarted = true;
            } else {
                inner.bus = None;
            }
        }

        let new_agent_id = inner.config.identity.agent_id;
        let old_agent_id = old_identity.agent_id;
        let ns = inner.config.namespace.clone();
        drop(inner);

        if identity_changed && old_agent_id != new_agent_id {
            if let Ok(bus) = self.bus().await {
                let _ = bus.publish(&topics::identity(&ns, &old_agent_id.to_string()), Vec::new(), true).await;
            }
        }
        if identity_changed || restarted {
            let _ = self.publish_identity().await;
        }

        self.generation.send_modify(|g| *g += 1);
        Ok((restarted, identity_changed))
    }

    pub async fn identity(&self) -> Identity {
        self.inner.read().await.config.identity.clone()
    }

    /// Whether a bus URL has been configured at all, regardless of whether
    /// it is currently connected.
    pub async fn has_bus(&self) -> bool {
        self.inner.read().await.bus.is_some()
    }

    /// Whether the configured bus is currently connected. False if no bus
    /// was configured.
    pub async fn is_bus_connected(&self) -> bool {
        match &self.inner.read().await.bus {
            Some(bus) => bus.is_connected(),
            None => false,
        }
    }

    /// Hand out the underlying bus client so the lifecycle tracker can
    /// subscribe to identity announcements directly.
    pub async fn bus_for_lifecycle(&self) -> Result<BusClient, GwError> {
        self.bus().await
    }

    async fn fail_fast(&self) -> bool {
        self.inner
            .read()
            .await
            .config
            .fail_fast_override
            .unwrap_or(self.default_fail_fast)
    }

    async fn bus(&self) -> Result<BusClient, GwError> {
        let inner = self.inner.read().await;
        match &inner.bus {
            Some(bus) if bus.is_connected() => Ok(bus.clone()),
            Some(bus) => {
                if self.fail_fast().await {
                    Err(GwError::unavailable("bus is offline"))
                } else {
                    Ok(bus.clone())
                }
            }
            None => Err(GwError::unavailable("bus is not configured")),
        }
    }

    async fn namespace(&self) -> String {
        self.inner.read().await.config.namespace.clone()
    }

    async fn agent_id(&self) -> Uuid {
        self.inner.read().await.config.identity.agent_id
    }

    pub async fn publish_channel(&self, id: &str, payload: &Payload) -> Result<(), GwError> {
        let bus = self.bus().await?;
        let ns = self.namespace().await;
        let source_id = self.agent_id().await;
        let bytes = BusPayload::to_bus(payload, Some(source_id)).to_bytes()?;
        bus.publish(&topics::channel(&ns, id), bytes, false).await
    }

    pub async fn observe_channel(&self, id: &str) -> Result<ReceiverStream<Result<ChannelEvent, GwError>>, GwError> {
        let bus = self.bus().await?;
        let ns = self.namespace().await;
        let topic = topics::channel(&ns, id);
        bus.subscribe_topic(&topic).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let mut events = bus.subscribe_events();
        let mut generation = self.generation.subscribe();
        let starting_generation = *generation.borrow();
        let id = id.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = generation.changed() => {
                        if *generation.borrow() != starting_generation {
                            break;
                        }
                    }
                    msg = events.recv() => {
                        match msg {
                            Ok(msg) if msg.topic == topic => {
                                let parsed = BusPayload::from_bytes(&msg.payload)
                                    .and_then(BusPayload::from_bus)
                                    .map(|(payload, source_id)| ChannelEvent {
                                        id: id.clone(),
                                        payload: Some(payload),
                                        source_id: source_id.map(|u| u.to_string()),
                                    });
                                if tx.send(parsed).await.is_err() {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "observe_channel lagged behind the bus");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    pub async fn publish_call(&self, operation: &str, payload: &Payload) -> Result<(Uuid, ReceiverStream<Result<ReturnEvent, GwError>>), GwError> {
        let bus = self.bus().await?;
        let ns = self.namespace().await;
        let source_id = self.agent_id().await;
        let correlation_id = Uuid::new_v4();

        let return_topic = topics::return_topic(&ns, operation);
        let complete_topic = topics::complete(&ns, operation);
        bus.subscribe_topic(&return_topic).await?;
        bus.subscribe_topic(&complete_topic).await?;

        let envelope = CallEnvelope::new(correlation_id, payload, Some(source_id));
        bus.publish(&topics::call(&ns, operation), envelope.to_bytes()?, false).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let mut events = bus.subscribe_events();
        let mut generation = self.generation.subscribe();
        let starting_generation = *generation.borrow();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = generation.changed() => {
                        if *generation.borrow() != starting_generation {
                            break;
                        }
                    }
                    msg = events.recv() => {
                        match msg {
                            Ok(msg) if msg.topic == return_topic => {
                                let Ok(env) = ReturnEnvelope::from_bytes(&msg.payload) else { continue };
                                if env.correlation_id != correlation_id {
                                    continue;
                                }
                                let error = env.error.clone();
                                let parsed = env.payload.from_bus().map(|(payload, _source_id)| ReturnEvent {
                                    operation: String::new(),
                                    correlation_id: correlation_id.to_string(),
                                    payload: Some(payload),
                                    error,
                                });
                                if tx.send(parsed).await.is_err() {
                                    break;
                                }
                            }
                            Ok(msg) if msg.topic == complete_topic => {
                                if let Ok(env) = CompleteEnvelope::from_bytes(&msg.payload) {
                                    if env.correlation_id == correlation_id {
                                        break;
                                    }
                                }
                            }
                            Ok(_) => {}
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "publish_call lagged behind the bus");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        Ok((correlation_id, ReceiverStream::new(rx)))
    }

    pub async fn observe_call(&self, operation: &str) -> Result<ReceiverStream<Result<CallEvent, GwError>>, GwError> {
        let bus = self.bus().await?;
        let ns = self.namespace().await;
        let topic = topics::call(&ns, operation);
        bus.subscribe_topic(&topic).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let mut events = bus.subscribe_events();
        let mut generation = self.generation.subscribe();
        let starting_generation = *generation.borrow();
        let operation = operation.to_string();
        let sinks = self.sinks.clone();

        tokio::spawn(async move {
            // Holds every ResponseSink this stream registers; dropped (and
            // the sinks released) whichever way the loop below exits.
            let mut guard = SinkGuard::new(sinks);
            loop {
                tokio::select! {
                    _ = generation.changed() => {
                        if *generation.borrow() != starting_generation {
                            break;
                        }
                    }
                    msg = events.recv() => {
                        match msg {
                            Ok(msg) if msg.topic == topic => {
                                let Ok(env) = CallEnvelope::from_bytes(&msg.payload) else { continue };
                                let correlation_id = guard.register(operation.clone(), env.correlation_id);
                                let parsed = env.payload.from_bus().map(|(payload, source_id)| CallEvent {
                                    operation: operation.clone(),
                                    correlation_id: correlation_id.to_string(),
                                    payload: Some(payload),
                                    source_id: source_id.map(|u| u.to_string()),
                                });
                                if tx.send(parsed).await.is_err() {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "observe_call lagged behind the bus");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Deliver a local observer's response for `correlation_id` to whichever
    /// remote `PublishCall` is awaiting it. Returns `false` without error if
    /// no `ResponseSink` is registered for the id — an already-completed or
    /// bogus correlation is silently discarded rather than rejected.
    pub async fn publish_return(&self, correlation_id: Uuid, payload: &Payload, error: Option<String>) -> Result<bool, GwError> {
        let sink = {
            let sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
            sinks.get(&correlation_id).map(|s| (s.operation.clone(), s.bus_correlation_id))
        };
        let Some((operation, bus_correlation_id)) = sink else {
            return Ok(false);
        };

        let bus = self.bus().await?;
        let ns = self.namespace().await;
        let source_id = self.agent_id().await;
        let envelope = ReturnEnvelope::new(bus_correlation_id, payload, Some(source_id), error);
        bus.publish(&topics::return_topic(&ns, &operation), envelope.to_bytes()?, false).await?;
        Ok(true)
    }

    /// Remove the `ResponseSink` for `correlation_id`, if present, and
    /// announce completion on the bus so the requester's `PublishCall`
    /// stream ends. A repeat call, or one for an unknown id, is a no-op.
    pub async fn publish_complete(&self, correlation_id: Uuid) -> Result<(), GwError> {
        let sink = {
            let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
            sinks.remove(&correlation_id)
        };
        let Some(sink) = sink else {
            return Ok(());
        };

        let bus = self.bus().await?;
        let ns = self.namespace().await;
        let source_id = self.agent_id().await;
        let envelope = CompleteEnvelope::new(sink.bus_correlation_id, Some(source_id));
        bus.publish(&topics::complete(&ns, &sink.operation), envelope.to_bytes()?, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> Bridge {
        Bridge::new(
            None,
            "tnc".to_string(),
            Uuid::new_v4(),
            "FlowPro Agent".to_string(),
            None,
            None,
            None,
            None,
            true,
            true,
        )
    }

    #[tokio::test]
    async fn configure_reports_identity_change() {
        let bridge = bridge();
        let (restarted, identity_changed) = bridge
            .configure(None, None, Some("New Name".to_string()), None, None, None, None)
            .await
            .unwrap();
        assert!(!restarted);
        assert!(identity_changed);
        assert_eq!(bridge.identity().await.agent_name, "New Name");
    }

    #[tokio::test]
    async fn configure_without_changes_reports_no_identity_change() {
        let bridge = bridge();
        let (restarted, identity_changed) = bridge
            .configure(None, None, None, None, None, None, Some(false))
            .await
            .unwrap();
        assert!(!restarted);
        assert!(!identity_changed);
    }

    #[tokio::test]
    async fn operations_without_a_bus_are_unavailable() {
        let bridge = bridge();
        let payload = Payload { type_url: "t".to_string(), value: vec![1] };
        let err = bridge.publish_channel("room", &payload).await.unwrap_err();
        assert!(matches!(err, GwError::Unavailable(_)));
    }

    #[tokio::test]
    async fn fail_fast_override_is_tracked_independent_of_default() {
        let bridge = bridge();
        bridge
            .configure(None, None, None, None, None, None, Some(false))
            .await
            .unwrap();
        assert!(!bridge.fail_fast().await);
    }

    #[tokio::test]
    async fn publish_return_with_unknown_correlation_is_a_silent_discard() {
        let bridge = bridge();
        let payload = Payload { type_url: "t".to_string(), value: vec![1] };
        let dispatched = bridge.publish_return(Uuid::new_v4(), &payload, None).await.unwrap();
        assert!(!dispatched);
    }

    #[tokio::test]
    async fn publish_complete_for_unknown_correlation_is_a_no_op() {
        let bridge = bridge();
        bridge.publish_complete(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn publish_return_with_a_registered_sink_attempts_dispatch_instead_of_discarding() {
        let bridge = bridge();
        let correlation_id = Uuid::new_v4();
        bridge
            .sinks
            .lock()
            .unwrap()
            .insert(correlation_id, ResponseSink { operation: "op".to_string(), bus_correlation_id: Uuid::new_v4() });

        let payload = Payload { type_url: "t".to_string(), value: vec![1] };
        // A sink exists, so this attempts to publish on the bus rather than
        // silently discarding, and fails because no bus is configured.
        let err = bridge.publish_return(correlation_id, &payload, None).await.unwrap_err();
        assert!(matches!(err, GwError::Unavailable(_)));
    }

    #[tokio::test]
    async fn publish_complete_with_a_registered_sink_removes_it_before_dispatching() {
        let bridge = bridge();
        let correlation_id = Uuid::new_v4();
        bridge
            .sinks
            .lock()
            .unwrap()
            .insert(correlation_id, ResponseSink { operation: "op".to_string(), bus_correlation_id: Uuid::new_v4() });

        let err = bridge.publish_complete(correlation_id).await.unwrap_err();
        assert!(matches!(err, GwError::Unavailable(_)));
        assert!(!bridge.sinks.lock().unwrap().contains_key(&correlation_id));
    }
}

