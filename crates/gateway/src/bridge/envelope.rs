// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON envelopes published on `call`/`return`/`complete` bus topics. Unlike
//! the plain [`crate::codec::BusPayload`] used on channels, these carry a
//! `correlationId` that threads a Call to its Returns and eventual Complete.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::BusPayload;
use crate::error::GwError;
use crate::proto::tnc::v1::Payload;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEnvelope {
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    #[serde(flatten)]
    pub payload: BusPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnEnvelope {
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    #[serde(flatten)]
    pub payload: BusPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteEnvelope {
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    #[serde(rename = "sourceId", skip_serializing_if = "Option::is_none")]
    pub source_id: Option<Uuid>,
}

impl CallEnvelope {
    pub fn new(correlation_id: Uuid, payload: &Payload, source_id: Option<Uuid>) -> Self {
        Self {
            correlation_id,
            payload: BusPayload::to_bus(payload, source_id),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GwError> {
        serde_json::to_vec(self).map_err(|e| GwError::internal(format!("encode call envelope: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GwError> {
        serde_json::from_slice(bytes).map_err(|e| GwError::validation(format!("malformed call envelope: {e}")))
    }
}

impl ReturnEnvelope {
    pub fn new(correlation_id: Uuid, payload: &Payload, source_id: Option<Uuid>, error: Option<String>) -> Self {
        Self {
            correlation_id,
            payload: BusPayload::to_bus(payload, source_id),
            error,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GwError> {
        serde_json::to_vec(self).map_err(|e| GwError::internal(format!("encode return envelope: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GwError> {
        serde_json::from_slice(bytes).map_err(|e| GwError::validation(format!("malformed return envelope: {e}")))
    }
}

impl CompleteEnvelope {
    pub fn new(correlation_id: Uuid, source_id: Option<Uuid>) -> Self {
        Self { correlation_id, source_id }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GwError> {
        serde_json::to_vec(self).map_err(|e| GwError::internal(format!("encode complete envelope: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GwError> {
        serde_json::from_slice(bytes).map_err(|e| GwError::validation(format!("malformed complete envelope: {e}")))
    }
}
