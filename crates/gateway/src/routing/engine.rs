// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::RwLock;

use indexmap::IndexMap;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::policy::DispatchPolicy;
use crate::error::GwError;
use crate::proto::tnc::v1::{PushEvent, RequestEvent, ResponseEvent};

/// A live push-route registration. Dropping the receiver end (stream
/// cancellation) removes the entry via [`RoutingEngine::deregister_push`].
pub struct PushRegistration {
    pub id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<PushEvent>,
}

/// A live request-route registration.
pub struct RequestRegistration {
    pub id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<RequestEvent>,
}

struct PushEntry {
    id: Uuid,
    sender: mpsc::UnboundedSender<PushEvent>,
}

struct RequestEntry {
    id: Uuid,
    sender: mpsc::UnboundedSender<RequestEvent>,
}

struct RequestGroup {
    policy: DispatchPolicy,
    entries: Vec<RequestEntry>,
    next_cursor: usize,
    counter: u32,
}

impl RequestGroup {
    fn new(policy: DispatchPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
            next_cursor: 0,
            counter: 0,
        }
    }

    /// Allocate the next monotonic request id for this group, wrapping
    /// through `1..=u32::MAX` and never emitting `0`.
    fn next_request_id(&mut self) -> u32 {
        self.counter = if self.counter == u32::MAX { 1 } else { self.counter + 1 };
        self.counter
    }

    fn pick(&mut self) -> Option<&RequestEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = match self.policy {
            DispatchPolicy::Single | DispatchPolicy::First => 0,
            DispatchPolicy::Last => self.entries.len() - 1,
            DispatchPolicy::Next => {
                let idx = self.next_cursor % self.entries.len();
                self.next_cursor = (idx + 1) % self.entries.len();
                idx
            }
            DispatchPolicy::Random => rand::rng().random_range(0..self.entries.len()),
        };
        self.entries.get(idx)
    }

    /// Keep the round-robin cursor valid after a registrant is removed, per
    /// the normalize-mod-length rule rather than resetting it to zero.
    fn normalize_cursor(&mut self) {
        if self.entries.is_empty() {
            self.next_cursor = 0;
        } else {
            self.next_cursor %= self.entries.len();
        }
    }
}

/// A request awaiting `Respond`, bound to the registration it was
/// dispatched to so a later deregistration only cancels requests actually
/// sent to the departing registrant.
struct PendingRequest {
    registrant_id: Uuid,
    reply: oneshot::Sender<ResponseEvent>,
}

#[derive(Default)]
struct PendingRequests {
    inner: HashMap<(String, u32), PendingRequest>,
}

/// Shared routing state for push and request route tables, scoped to one
/// gateway instance. Cheap to clone: internally reference-counted.
#[derive(Clone)]
pub struct RoutingEngine {
    push: std::sync::Arc<RwLock<IndexMap<String, Vec<PushEntry>>>>,
    request: std::sync::Arc<RwLock<IndexMap<String, RequestGroup>>>,
    pending: std::sync::Arc<StdMutex<PendingRequests>>,
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self {
            push: std::sync::Arc::new(RwLock::new(IndexMap::new())),
            request: std::sync::Arc::new(RwLock::new(IndexMap::new())),
            pending: std::sync::Arc::new(StdMutex::new(PendingRequests::default())),
        }
    }
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new push-route listener. Fan-out ordering among
    /// registrants follows registration order.
    pub fn register_push(&self, route: impl Into<String>) -> PushRegistration {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut table = self.push.write().unwrap_or_else(|e| e.into_inner());
        table.entry(route.into()).or_default().push(PushEntry { id, sender: tx });
        PushRegistration { id, receiver: rx }
    }

    pub fn deregister_push(&self, route: &str, id: Uuid) {
        let mut table = self.push.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = table.get_mut(route) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                table.shift_remove(route);
            }
        }
    }

    /// Fan the payload out to every registrant on `route`, returning the
    /// number of registrants it was delivered to.
    pub fn push(&self, route: &str, event: PushEvent) -> u32 {
        let table = self.push.read().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = table.get(route) else {
            return 0;
        };
        let mut count = 0u32;
        for entry in entries {
            if entry.sender.send(event.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Register a new request-route listener under `policy`. Rejects the
    /// registration if the route already exists under a different policy.
    pub fn register_request(
        &self,
        route: impl Into<String>,
        policy: DispatchPolicy,
    ) -> Result<RequestRegistration, GwError> {
        let route = route.into();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut table = self.request.write().unwrap_or_else(|e| e.into_inner());
        let group = table.entry(route.clone()).or_insert_with(|| RequestGroup::new(policy));
        if group.policy != policy {
            return Err(GwError::validation(format!(
                "route {route} is already registered under a different dispatch policy"
            )));
        }
        if policy == DispatchPolicy::Single && !group.entries.is_empty() {
            return Err(GwError::validation(format!(
                "route {route} already has a SINGLE registrant"
            )));
        }
        group.entries.push(RequestEntry { id, sender: tx });
        Ok(RequestRegistration { id, receiver: rx })
    }

    pub fn deregister_request(&self, route: &str, id: Uuid) {
        let mut table = self.request.write().unwrap_or_else(|e| e.into_inner());
        if let Some(group) = table.get_mut(route) {
            group.entries.retain(|e| e.id != id);
            group.normalize_cursor();
            if group.entries.is_empty() {
                table.shift_remove(route);
            }
        }
        // Only cancel pending requests actually dispatched to the departing
        // registrant; requests chosen for other registrants on the same
        // route must keep waiting for their own `Respond`.
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.inner.retain(|(r, _), p| !(r == route && p.registrant_id == id));
    }

    /// Dispatch a request to the chosen registrant per the route's policy
    /// and await its `Respond`. Returns `Unavailable` if no registrant is
    /// currently registered for `route`.
    pub async fn request(&self, route: &str, payload: crate::proto::tnc::v1::Payload) -> Result<ResponseEvent, GwError> {
        let (request_id, registrant_id, sender) = {
            let mut table = self.request.write().unwrap_or_else(|e| e.into_inner());
            let group = table
                .get_mut(route)
                .ok_or_else(|| GwError::unavailable(format!("no registrant for route {route}")))?;
            let entry = group
                .pick()
                .ok_or_else(|| GwError::unavailable(format!("no registrant for route {route}")))?;
            let registrant_id = entry.id;
            let sender = entry.sender.clone();
            (group.next_request_id(), registrant_id, sender)
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending
                .inner
                .insert((route.to_string(), request_id), PendingRequest { registrant_id, reply: reply_tx });
        }

        let event = RequestEvent {
            route: route.to_string(),
            request_id,
            payload: Some(payload),
        };
        if sender.send(event).is_err() {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.inner.remove(&(route.to_string(), request_id));
            return Err(GwError::unavailable(format!("registrant for route {route} disconnected")));
        }

        reply_rx
            .await
            .map_err(|_| GwError::cancelled(format!("request {request_id} on route {route} was cancelled")))
    }

    /// Deliver a registrant's response to the caller awaiting `request_id`
    /// on `route`. Returns `routing_count = 1` if the waiter was still
    /// there to receive it, `0` if it had already given up (e.g. deadline
    /// exceeded) before the response arrived. Returns `Validation` if no
    /// such correlated registration exists at all — a bogus or
    /// already-completed `(route, request_id)` pair.
    pub fn respond(&self, route: &str, request_id: u32, event: ResponseEvent) -> Result<u32, GwError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.inner.remove(&(route.to_string(), request_id)) {
            Some(p) => Ok(if p.reply.send(event).is_ok() { 1 } else { 0 }),
            None => Err(GwError::validation("Response event discarded as no correlated registration exists")),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
