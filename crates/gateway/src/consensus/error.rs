// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use openraft::error::{ClientWriteError, RaftError};

use super::types::NodeId;
use crate::error::GwError;

/// Translates an openraft client-write failure into the gateway's error
/// taxonomy. Queue backpressure maps to `OutOfRange` so callers can retry;
/// everything else not explicitly named collapses to `Internal`.
pub fn translate_client_write_error(err: RaftError<NodeId, ClientWriteError<NodeId, openraft::BasicNode>>) -> GwError {
    match err {
        RaftError::APIError(ClientWriteError::ChangeMembershipError(_)) => {
            GwError::unavailable("membership change in progress")
        }
        RaftError::APIError(ClientWriteError::ForwardToLeader(_)) => {
            GwError::unavailable("this node is not the current leader")
        }
        RaftError::Fatal(fatal) => GwError::internal(format!("raft fatal error: {fatal}")),
        other => GwError::internal(format!("raft client write failed: {other}")),
    }
}

/// Error conditions specific to the connection-state machine that aren't
/// represented directly by openraft's own error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFault {
    TooManyQueuedUpInputProposals,
    DisconnectBeforeOperationComplete,
    OperationNotSupportedInCurrentConnectionState(&'static str),
}

impl From<ConnectionFault> for GwError {
    fn from(fault: ConnectionFault) -> Self {
        match fault {
            ConnectionFault::TooManyQueuedUpInputProposals => {
                GwError::out_of_range("too many queued-up input proposals")
            }
            ConnectionFault::DisconnectBeforeOperationComplete => {
                GwError::unavailable("node disconnected before the operation completed")
            }
            ConnectionFault::OperationNotSupportedInCurrentConnectionState(state) => {
                GwError::unavailable(format!("operation not supported while the node is {state}"))
            }
        }
    }
}
