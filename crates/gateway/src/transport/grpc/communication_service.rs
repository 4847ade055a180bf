// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use super::GrpcStream;
use crate::bus::topics::validate_segment;
use crate::proto::tnc::v1::communication_service_server::CommunicationService;
use crate::proto::tnc::v1::{
    CallEvent, ChannelEvent, ConfigureRequest, ConfigureResponse, ObserveCallRequest, ObserveChannelRequest,
    PublishCallRequest, PublishChannelRequest, PublishCompleteRequest, PublishReturnRequest, ReturnEvent,
};
use crate::state::Store;

pub struct CommunicationServiceImpl {
    state: Store,
}

impl CommunicationServiceImpl {
    pub fn new(state: Store) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl CommunicationService for CommunicationServiceImpl {
    type ObserveChannelStream = GrpcStream<ChannelEvent>;
    type PublishCallStream = GrpcStream<ReturnEvent>;
    type ObserveCallStream = GrpcStream<CallEvent>;

    async fn configure(&self, request: Request<ConfigureRequest>) -> Result<Response<ConfigureResponse>, Status> {
        let req = request.into_inner();
        let agent_id = req.agent_id.map(|s| Uuid::parse_str(&s)).transpose().map_err(|e| Status::invalid_argument(e.to_string()))?;
        let (restarted, identity_changed) = self
            .state
            .bridge
            .configure(
                req.bus_url,
                req.namespace,
                req.agent_name,
                agent_id,
                req.username,
                req.password,
                req.fail_fast_if_offline,
            )
            .await?;
        Ok(Response::new(ConfigureResponse { restarted, identity_changed }))
    }

    async fn publish_channel(&self, request: Request<PublishChannelRequest>) -> Result<Response<crate::proto::tnc::v1::EventAck>, Status> {
        let req = request.into_inner();
        validate_segment("channel id", &req.id)?;
        let payload = req.payload.ok_or_else(|| Status::invalid_argument("missing payload"))?;
        self.state.bridge.publish_channel(&req.id, &payload).await?;
        Ok(Response::new(crate::proto::tnc::v1::EventAck { accepted: true }))
    }

    async fn observe_channel(&self, request: Request<ObserveChannelRequest>) -> Result<Response<Self::ObserveChannelStream>, Status> {
        let req = request.into_inner();
        validate_segment("channel id", &req.id)?;
        let stream = self.state.bridge.observe_channel(&req.id).await?;
        let mapped = stream.map(|item| item.map_err(Status::from));
        Ok(Response::new(Box::pin(mapped) as Self::ObserveChannelStream))
    }

    async fn publish_call(&self, request: Request<PublishCallRequest>) -> Result<Response<Self::PublishCallStream>, Status> {
        let req = request.into_inner();
        validate_segment("operation", &req.operation)?;
        let payload = req.payload.ok_or_else(|| Status::invalid_argument("missing payload"))?;
        let (_correlation_id, stream) = self.state.bridge.publish_call(&req.operation, &payload).await?;
        let mapped = stream.map(|item| item.map_err(Status::from));
        Ok(Response::new(Box::pin(mapped) as Self::PublishCallStream))
    }

    async fn observe_call(&self, request: Request<ObserveCallRequest>) -> Result<Response<Self::ObserveCallStream>, Status> {
        let req = request.into_inner();
        validate_segment("operation", &req.operation)?;
        let stream = self.state.bridge.observe_call(&req.operation).await?;
        let mapped = stream.map(|item| item.map_err(Status::from));
        Ok(Response::new(Box::pin(mapped) as Self::ObserveCallStream))
    }

    async fn publish_return(&self, request: Request<PublishReturnRequest>) -> Result<Response<crate::proto::tnc::v1::EventAck>, Status> {
        let req = request.into_inner();
        let payload = req.payload.ok_or_else(|| Status::invalid_argument("missing payload"))?;
        let correlation_id = Uuid::parse_str(&req.correlation_id).map_err(|e| Status::invalid_argument(e.to_string()))?;
        let dispatched = self.state.bridge.publish_return(correlation_id, &payload, req.error).await?;
        Ok(Response::new(crate::proto::tnc::v1::EventAck { accepted: dispatched }))
    }

    async fn publish_complete(&self, request: Request<PublishCompleteRequest>) -> Result<Response<crate::proto::tnc::v1::EventAck>, Status> {
        let req = request.into_inner();
        let correlation_id = Uuid::parse_str(&req.correlation_id).map_err(|e| Status::invalid_argument(e.to_string()))?;
        self.state.bridge.publish_complete(correlation_id).await?;
        Ok(Response::new(crate::proto::tnc::v1::EventAck { accepted: true }))
    }
}
