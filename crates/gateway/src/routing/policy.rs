// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::GwError;
use crate::proto::tnc::v1::RequestPolicy as WirePolicy;

/// Dispatch policy governing which registrant of a request route receives
/// each inbound `Request` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// Exactly one registrant may be registered at a time.
    Single,
    /// Always dispatches to the first-registered registrant.
    First,
    /// Always dispatches to the most-recently-registered registrant.
    Last,
    /// Round-robins across registrants in registration order.
    Next,
    /// Picks a uniformly random registrant for each request.
    Random,
}

impl DispatchPolicy {
    pub fn from_wire(value: i32) -> Result<Self, GwError> {
        match WirePolicy::try_from(value) {
            Ok(WirePolicy::Single) => Ok(Self::Single),
            Ok(WirePolicy::First) => Ok(Self::First),
            Ok(WirePolicy::Last) => Ok(Self::Last),
            Ok(WirePolicy::Next) => Ok(Self::Next),
            Ok(WirePolicy::Random) => Ok(Self::Random),
            _ => Err(GwError::validation("unspecified or unknown request policy")),
        }
    }
}
