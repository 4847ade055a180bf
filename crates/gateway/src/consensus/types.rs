// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GwError;
use crate::proto::tnc::v1::k_v_value::Kind as WireKind;
use crate::proto::tnc::v1::KvValue as WireKvValue;

/// A leaf value in the replicated key/value state machine. Mirrors the
/// scalar variants of `google.protobuf.Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KvValue {
    Null,
    Number(f64),
    String(String),
    Bool(bool),
}

impl KvValue {
    pub fn from_wire(value: Option<WireKvValue>) -> Result<Self, GwError> {
        let Some(value) = value else {
            return Ok(Self::Null);
        };
        match value.kind {
            Some(WireKind::NullValue(_)) | None => Ok(Self::Null),
            Some(WireKind::NumberValue(n)) => Ok(Self::Number(n)),
            Some(WireKind::StringValue(s)) => Ok(Self::String(s)),
            Some(WireKind::BoolValue(b)) => Ok(Self::Bool(b)),
        }
    }

    pub fn to_wire(&self) -> WireKvValue {
        let kind = match self {
            Self::Null => WireKind::NullValue(0),
            Self::Number(n) => WireKind::NumberValue(*n),
            Self::String(s) => WireKind::StringValue(s.clone()),
            Self::Bool(b) => WireKind::BoolValue(*b),
        };
        WireKvValue { kind: Some(kind) }
    }
}

/// A write proposed through `Raft::client_write`. `Put` replaces the entry
/// at `key` with `value`; `Noop` carries no mutation and exists purely to
/// round-trip a proposal through the log, giving `GetState` a read-index
/// guarantee that the state it returns reflects everything committed up to
/// the moment of the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KvCommand {
    Put { key: String, value: KvValue },
    Noop,
}

/// The full state machine contents returned after a write is applied, and
/// by the `GetState`/`ObserveState` reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KvResponse {
    pub state: BTreeMap<String, KvValue>,
}

impl KvResponse {
    pub fn to_wire_map(&self) -> std::collections::HashMap<String, WireKvValue> {
        self.state.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect()
    }
}

/// Raft node identifier, backed by a uuid so ids can be generated locally
/// without a coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for NodeId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

openraft::declare_raft_types!(
    pub TncTypeConfig:
        D = KvCommand,
        R = KvResponse,
        NodeId = NodeId,
        Node = openraft::BasicNode,
        Entry = openraft::Entry<TncTypeConfig>,
        SnapshotData = std::io::Cursor<Vec<u8>>,
);
