// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};

use super::GrpcStream;
use crate::proto::tnc::v1::routing_service_server::RoutingService;
use crate::proto::tnc::v1::{
    PushEvent, PushRoute, RequestEvent, RequestRoute, ResponseEvent, RouteEventAck,
};
use crate::routing::DispatchPolicy;
use crate::state::Store;

pub struct RoutingServiceImpl {
    state: Store,
}

impl RoutingServiceImpl {
    pub fn new(state: Store) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl RoutingService for RoutingServiceImpl {
    type RegisterPushRouteStream = GrpcStream<PushEvent>;
    type RegisterRequestRouteStream = GrpcStream<RequestEvent>;

    async fn register_push_route(&self, request: Request<PushRoute>) -> Result<Response<Self::RegisterPushRouteStream>, Status> {
        let route = request.into_inner().route;
        let registration = self.state.routing.register_push(route.clone());
        let engine = self.state.routing.clone();
        let id = registration.id;

        let stream = UnboundedReceiverStream::new(registration.receiver).map(Ok);
        let guarded = GuardedStream { route, id, engine, inner: stream };
        Ok(Response::new(Box::pin(guarded) as Self::RegisterPushRouteStream))
    }

    async fn register_request_route(&self, request: Request<RequestRoute>) -> Result<Response<Self::RegisterRequestRouteStream>, Status> {
        let inner = request.into_inner();
        let policy = DispatchPolicy::from_wire(inner.policy)?;
        let registration = self.state.routing.register_request(inner.route.clone(), policy)?;
        let engine = self.state.routing.clone();
        let id = registration.id;
        let route = inner.route;

        let stream = UnboundedReceiverStream::new(registration.receiver).map(Ok);
        let guarded = GuardedRequestStream { route, id, engine, inner: stream };
        Ok(Response::new(Box::pin(guarded) as Self::RegisterRequestRouteStream))
    }

    async fn push(&self, request: Request<PushEvent>) -> Result<Response<RouteEventAck>, Status> {
        let event = request.into_inner();
        let count = self.state.routing.push(&event.route.clone(), event);
        Ok(Response::new(RouteEventAck { routing_count: count }))
    }

    async fn request(&self, request: Request<RequestEvent>) -> Result<Response<ResponseEvent>, Status> {
        let event = request.into_inner();
        let payload = event
            .payload
            .ok_or_else(|| Status::invalid_argument("request is missing a payload"))?;
        let response = self.state.routing.request(&event.route, payload).await?;
        Ok(Response::new(response))
    }

    async fn respond(&self, request: Request<ResponseEvent>) -> Result<Response<RouteEventAck>, Status> {
        let event = request.into_inner();
        let count = self.state.routing.respond(&event.route, event.request_id, event.clone())?;
        Ok(Response::new(RouteEventAck { routing_count: count }))
    }
}

/// Wraps a push-route stream so dropping it (client disconnect or
/// cancellation) deregisters the registration from the routing engine.
struct GuardedStream<S> {
    route: String,
    id: uuid::Uuid,
    engine: crate::routing::RoutingEngine,
    inner: S,
}

impl<S: tokio_stream::Stream<Item = Result<PushEvent, Status>> + Unpin> tokio_stream::Stream for GuardedStream<S> {
    type Item = Result<PushEvent, Status>;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl<S> Drop for GuardedStream<S> {
    fn drop(&mut self) {
        self.engine.deregister_push(&self.route, self.id);
    }
}

struct GuardedRequestStream<S> {
    route: String,
    id: uuid::Uuid,
    engine: crate::routing::RoutingEngine,
    inner: S,
}

impl<S: tokio_stream::Stream<Item = Result<RequestEvent, Status>> + Unpin> tokio_stream::Stream for GuardedRequestStream<S> {
    type Item = Result<RequestEvent, Status>;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl<S> Drop for GuardedRequestStream<S> {
    fn drop(&mut self) {
        self.engine.deregister_request(&self.route, self.id);
    }
}
