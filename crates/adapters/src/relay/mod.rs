// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discord relay adapters
//!
//! The hub hands everything it wants shown on Discord to a [`RelayAdapter`].
//! The Discord gateway itself lives outside this workspace; embedders bridge
//! to it through [`ChannelRelayAdapter`].

mod channel;
mod log;

pub use channel::ChannelRelayAdapter;
pub use log::LogRelayAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRelayAdapter;

use async_trait::async_trait;
use polychat_core::{AgentId, ServerState};
use thiserror::Error;

/// Errors from relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay closed")]
    Closed,

    #[error("relay failed: {0}")]
    Failed(String),
}

/// Something an agent said or did that should appear on Discord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Chat {
        agent: AgentId,
        sender: String,
        body: String,
    },
    Status {
        agent: AgentId,
        state: ServerState,
    },
    /// A command result nobody on the hub was waiting for
    CommandOutput {
        agent: AgentId,
        success: bool,
        detail: String,
    },
}

impl RelayMessage {
    pub fn agent(&self) -> &AgentId {
        match self {
            Self::Chat { agent, .. }
            | Self::Status { agent, .. }
            | Self::CommandOutput { agent, .. } => agent,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Status { .. } => "status",
            Self::CommandOutput { .. } => "command_output",
        }
    }

    /// Plain-text rendering suitable for a Discord channel.
    pub fn render(&self) -> String {
        match self {
            Self::Chat {
                agent,
                sender,
                body,
            } => {
                if sender.is_empty() {
                    format!("[{agent}] {body}")
                } else {
                    format!("[{agent}] {sender} {body}")
                }
            }
            Self::Status { agent, state } => format!("Server {agent} has {state}."),
            Self::CommandOutput {
                agent,
                success: true,
                detail,
            } => format!("[{agent}] {detail}"),
            Self::CommandOutput {
                agent,
                success: false,
                detail,
            } => format!("[{agent}] command failed: {detail}"),
        }
    }
}

/// Adapter for forwarding hub traffic to Discord
#[async_trait]
pub trait RelayAdapter: Clone + Send + Sync + 'static {
    async fn relay(&self, message: RelayMessage) -> Result<(), RelayError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
