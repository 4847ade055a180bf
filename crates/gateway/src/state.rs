// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared gateway state composed of each subsystem, handed to every
//! gRPC service implementation. Mirrors the teacher's `Store` composition of
//! independent sub-states behind one shared handle.

use std::sync::Arc;

use uuid::Uuid;

use crate::bridge::Bridge;
use crate::config::Config;
use crate::consensus::ConsensusGateway;
use crate::lifecycle::LifecycleTracker;
use crate::routing::RoutingEngine;

#[derive(Clone)]
pub struct Store {
    pub routing: RoutingEngine,
    pub bridge: Bridge,
    pub lifecycle: LifecycleTracker,
    pub consensus: ConsensusGateway,
    inner: Arc<StoreInner>,
}

struct StoreInner {
    agent_id: Uuid,
}

impl Store {
    pub fn new(config: &Config) -> Self {
        let agent_id = config.effective_agent_id();
        let bridge = Bridge::new(
            config.bus_url.clone(),
            config.namespace.clone(),
            agent_id,
            config.agent_name.clone(),
            config.bus_username.clone(),
            config.bus_password.clone(),
            config.tls_cert.clone(),
            config.tls_key.clone(),
            config.tls_verify,
            config.fail_fast_if_offline,
        );
        let consensus = ConsensusGateway::new(
            config.effective_consensus_db_folder(),
            format!("127.0.0.1:{}", config.grpc_port),
        );
        Self {
            routing: RoutingEngine::new(),
            bridge,
            lifecycle: LifecycleTracker::new(),
            consensus,
            inner: Arc::new(StoreInner { agent_id }),
        }
    }

    pub fn agent_id(&self) -> Uuid {
        self.inner.agent_id
    }
}
