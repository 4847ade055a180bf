// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod communication_service;
mod consensus_service;
mod lifecycle_service;
mod raft_transport_service;
mod routing_service;

use std::pin::Pin;

use tokio_stream::Stream;
use tonic::Status;

use crate::proto::tnc::v1::communication_service_server::CommunicationServiceServer;
use crate::proto::tnc::v1::consensus_service_server::ConsensusServiceServer;
use crate::proto::tnc::v1::lifecycle_service_server::LifecycleServiceServer;
use crate::proto::tnc::v1::raft_transport_server::RaftTransportServer;
use crate::proto::tnc::v1::routing_service_server::RoutingServiceServer;
use crate::state::Store;

pub(crate) type GrpcStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

pub use communication_service::CommunicationServiceImpl;
pub use consensus_service::ConsensusServiceImpl;
pub use lifecycle_service::LifecycleServiceImpl;
pub use raft_transport_service::RaftTransportImpl;
pub use routing_service::RoutingServiceImpl;

/// Build the `tonic` router serving all five services over the gateway's
/// single gRPC port.
pub fn into_router(state: Store) -> tonic::transport::server::Router {
    tonic::transport::Server::builder()
        .add_service(RoutingServiceServer::new(RoutingServiceImpl::new(state.clone())))
        .add_service(CommunicationServiceServer::new(CommunicationServiceImpl::new(state.clone())))
        .add_service(LifecycleServiceServer::new(LifecycleServiceImpl::new(state.clone())))
        .add_service(ConsensusServiceServer::new(ConsensusServiceImpl::new(state.clone())))
        .add_service(RaftTransportServer::new(RaftTransportImpl::new(state)))
}
