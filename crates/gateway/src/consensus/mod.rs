// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-agent consensus gateway: a multiplexer of named `openraft` nodes
//! bridged onto the `ConsensusService` and `RaftTransport` gRPC surfaces.

mod error;
mod gateway;
mod network;
mod node;
mod store;
mod types;

pub use error::translate_client_write_error;
pub use gateway::ConsensusGateway;
pub use network::{GrpcNetwork, GrpcNetworkFactory};
pub use node::{ConnectionState, RaftNode};
pub use types::{KvCommand, KvResponse, KvValue, NodeId, TncTypeConfig};
