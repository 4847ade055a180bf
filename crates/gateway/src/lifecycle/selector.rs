// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use regex::Regex;
use uuid::Uuid;

use crate::error::GwError;
use crate::proto::tnc::v1::agent_selector::Selector as WireSelector;
use crate::proto::tnc::v1::AgentSelector as WireAgentSelector;

use super::tracker::AgentInfo;

/// The default role assigned to agents that don't declare one of their own.
pub const DEFAULT_ROLE: &str = "TNC Agent";

/// Which agents a `TrackAgents` call is interested in. An empty selector
/// matches every agent carrying the default `"TNC Agent"` role; the other
/// variants narrow to an exact id, an exact name, or a `/regex/` against the
/// name, compiled once when the selector is created.
#[derive(Debug, Clone)]
pub enum AgentSelector {
    DefaultRole,
    Id(Uuid),
    Name(String),
    Regex(Regex),
}

impl AgentSelector {
    pub fn from_wire(wire: Option<WireAgentSelector>) -> Result<Self, GwError> {
        let Some(wire) = wire else {
            return Ok(Self::DefaultRole);
        };
        match wire.selector {
            None => Ok(Self::DefaultRole),
            Some(WireSelector::IdentityId(id)) if id.is_empty() => Ok(Self::DefaultRole),
            Some(WireSelector::IdentityId(id)) => {
                let id = Uuid::parse_str(&id).map_err(|e| GwError::validation(format!("invalid agent id: {e}")))?;
                Ok(Self::Id(id))
            }
            Some(WireSelector::IdentityName(name)) if name.is_empty() => Ok(Self::DefaultRole),
            Some(WireSelector::IdentityName(name)) => {
                if let Some(pattern) = name.strip_prefix('/').and_then(|rest| rest.strip_suffix('/')) {
                    let regex = Regex::new(pattern).map_err(|e| GwError::validation(format!("invalid selector regex: {e}")))?;
                    Ok(Self::Regex(regex))
                } else {
                    Ok(Self::Name(name))
                }
            }
        }
    }

    pub fn matches(&self, agent: &AgentInfo) -> bool {
        match self {
            Self::DefaultRole => agent.role == DEFAULT_ROLE,
            Self::Id(id) => agent.id == *id,
            Self::Name(name) => agent.name == *name,
            Self::Regex(re) => re.is_match(&agent.name),
        }
    }
}
