// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversion between the wire-shaped [`Payload`] used on the gRPC surface
//! and the JSON shape published onto the bus. Payload bytes are opaque here:
//! this module never inspects or decodes the caller's `value`.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GwError;
use crate::proto::tnc::v1::Payload;

/// The JSON object published onto bus channels, calls, and returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusPayload {
    #[serde(rename = "objectType")]
    pub object_type: String,
    pub value: String,
    #[serde(rename = "sourceId", skip_serializing_if = "Option::is_none")]
    pub source_id: Option<Uuid>,
}

impl BusPayload {
    /// Convert a gRPC [`Payload`] into the bus wire shape, stamping the
    /// publishing agent's id as `sourceId` when one is given.
    pub fn to_bus(payload: &Payload, source_id: Option<Uuid>) -> Self {
        Self {
            object_type: payload.type_url.clone(),
            value: base64::engine::general_purpose::STANDARD.encode(&payload.value),
            source_id,
        }
    }

    /// Convert a bus-shaped JSON payload back into a gRPC [`Payload`],
    /// returning the embedded `sourceId` alongside it.
    pub fn from_bus(self) -> Result<(Payload, Option<Uuid>), GwError> {
        let value = base64::engine::general_purpose::STANDARD
            .decode(self.value.as_bytes())
            .map_err(|e| GwError::validation(format!("payload value is not valid base64: {e}")))?;
        Ok((
            Payload {
                type_url: self.object_type,
                value,
            },
            self.source_id,
        ))
    }

    /// Serialize this payload to the JSON bytes published on the bus.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GwError> {
        serde_json::to_vec(self).map_err(|e| GwError::internal(format!("encode payload: {e}")))
    }

    /// Parse bus JSON bytes into a [`BusPayload`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GwError> {
        serde_json::from_slice(bytes).map_err(|e| GwError::validation(format!("malformed bus payload: {e}")))
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
