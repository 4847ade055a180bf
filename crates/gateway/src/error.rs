// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Unified error taxonomy shared across the routing engine, bus bridge, and
/// consensus gateway. Mapped to [`tonic::Status`] only at the gRPC edge so
/// internal modules stay transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GwError {
    /// Validation — caller supplied a malformed or disallowed request.
    Validation(String),
    /// Unavailability — bus offline, no registration, or wrong connection state.
    Unavailable(String),
    /// Cancellation — deadline exceeded or stream/registration cancelled.
    Cancelled(String),
    /// Backpressure — e.g. the Raft proposal queue is full.
    OutOfRange(String),
    /// Fault — unclassified library error or serialization failure.
    Internal(String),
}

impl GwError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Unavailable(m)
            | Self::Cancelled(m)
            | Self::OutOfRange(m)
            | Self::Internal(m) => m,
        }
    }

    /// Convert this error into a [`tonic::Status`] carrying the matching
    /// gRPC status code.
    pub fn to_grpc_status(&self) -> tonic::Status {
        let code = match self {
            Self::Validation(_) => tonic::Code::InvalidArgument,
            Self::Unavailable(_) => tonic::Code::Unavailable,
            Self::Cancelled(_) => tonic::Code::Cancelled,
            Self::OutOfRange(_) => tonic::Code::OutOfRange,
            Self::Internal(_) => tonic::Code::Internal,
        };
        tonic::Status::new(code, self.message().to_owned())
    }
}

impl fmt::Display for GwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for GwError {}

impl From<GwError> for tonic::Status {
    fn from(e: GwError) -> Self {
        e.to_grpc_status()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
