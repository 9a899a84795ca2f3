// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome of a targeted send.

use crate::id::AgentId;
use std::time::Duration;
use thiserror::Error;

/// Why a targeted send did not reach its agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("agent {0} is not connected")]
    NotConnected(AgentId),

    #[error("agent {agent} did not respond within {}ms", after.as_millis())]
    Timeout { agent: AgentId, after: Duration },

    #[error("write to agent {agent} failed: {reason}")]
    WriteFailed { agent: AgentId, reason: String },

    #[error("envelope rejected: {0}")]
    Rejected(String),
}

impl DeliveryError {
    /// Agent the failed send was addressed to, if any.
    pub fn agent(&self) -> Option<&AgentId> {
        match self {
            Self::NotConnected(agent)
            | Self::Timeout { agent, .. }
            | Self::WriteFailed { agent, .. } => Some(agent),
            Self::Rejected(_) => None,
        }
    }
}

/// Success or typed failure of one targeted send.
pub type DeliveryResult = Result<(), DeliveryError>;

/// What a target-aware send did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the one addressed agent
    Sent,
    /// Fanned out; `reached` sessions accepted the envelope into their queues
    Broadcast { reached: usize },
}
