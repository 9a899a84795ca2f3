// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message envelopes exchanged between the hub and its agents.
//!
//! An [`Envelope`] is a closed set of kinds. The wire tag lives outside the
//! JSON payload (see the hub's codec), so each payload struct serializes on
//! its own without a `type` field.

use crate::id::{AgentId, CorrelationId, Target};
use serde::{Deserialize, Serialize};

/// Identification frame an agent sends first on every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub server_id: String,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub server_address: String,
    #[serde(default)]
    pub max_players: u32,
}

/// Console command the hub asks one or all agents to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericCommand {
    /// Command run on the game server when no override is configured there
    pub default_command: String,
    /// Name of the Discord command that produced this request
    pub discord_command_name: String,
    /// Channel the agent reports results to
    pub discord_channel_id: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCommand {
    pub server_id: Target,
    pub command: GenericCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationId>,
}

/// Plain text shown to every player on the receiving servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBroadcast {
    pub message: String,
}

/// Chat line originating from a server (or from Discord, when forwarded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub server_id: String,
    pub message: String,
    /// Byte index of the last byte of the sender segment in `message`
    #[serde(default)]
    pub message_offset: u32,
}

impl ChatMessage {
    /// Split the message into its sender segment and body.
    ///
    /// The sender runs through `message_offset` inclusive. The split point is
    /// clamped to the message length and moved back to the nearest char
    /// boundary. Whitespace between the two segments is trimmed.
    pub fn split(&self) -> (&str, &str) {
        let mut at = (self.message_offset as usize)
            .saturating_add(1)
            .min(self.message.len());
        while !self.message.is_char_boundary(at) {
            at -= 1;
        }
        let (sender, body) = self.message.split_at(at);
        (sender.trim_end(), body.trim_start())
    }
}

/// Outcome an agent reports for a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationId>,
    pub success: bool,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Started,
    Stopped,
    Crashed,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => f.write_str("started"),
            Self::Stopped => f.write_str("stopped"),
            Self::Crashed => f.write_str("crashed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub server_id: String,
    pub state: ServerState,
}

/// Wire tag for each envelope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeKind {
    ServerInfo = 1,
    ServerCommand = 2,
    ChatBroadcast = 3,
    ChatMessage = 4,
    CommandResult = 5,
    ServerStatus = 6,
}

impl EnvelopeKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::ServerInfo),
            2 => Some(Self::ServerCommand),
            3 => Some(Self::ChatBroadcast),
            4 => Some(Self::ChatMessage),
            5 => Some(Self::CommandResult),
            6 => Some(Self::ServerStatus),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ServerInfo => "server_info",
            Self::ServerCommand => "server_command",
            Self::ChatBroadcast => "chat_broadcast",
            Self::ChatMessage => "chat_message",
            Self::CommandResult => "command_result",
            Self::ServerStatus => "server_status",
        }
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One typed message exchanged with an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    ServerInfo(ServerInfo),
    ServerCommand(ServerCommand),
    ChatBroadcast(ChatBroadcast),
    ChatMessage(ChatMessage),
    CommandResult(CommandResult),
    ServerStatus(ServerStatus),
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::ServerInfo(_) => EnvelopeKind::ServerInfo,
            Self::ServerCommand(_) => EnvelopeKind::ServerCommand,
            Self::ChatBroadcast(_) => EnvelopeKind::ChatBroadcast,
            Self::ChatMessage(_) => EnvelopeKind::ChatMessage,
            Self::CommandResult(_) => EnvelopeKind::CommandResult,
            Self::ServerStatus(_) => EnvelopeKind::ServerStatus,
        }
    }

    /// Serialize the payload (without tag or length prefix).
    pub fn payload_to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::ServerInfo(p) => serde_json::to_vec(p),
            Self::ServerCommand(p) => serde_json::to_vec(p),
            Self::ChatBroadcast(p) => serde_json::to_vec(p),
            Self::ChatMessage(p) => serde_json::to_vec(p),
            Self::CommandResult(p) => serde_json::to_vec(p),
            Self::ServerStatus(p) => serde_json::to_vec(p),
        }
    }

    /// Parse a payload of the given kind.
    pub fn payload_from_slice(kind: EnvelopeKind, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EnvelopeKind::ServerInfo => Self::ServerInfo(serde_json::from_slice(bytes)?),
            EnvelopeKind::ServerCommand => Self::ServerCommand(serde_json::from_slice(bytes)?),
            EnvelopeKind::ChatBroadcast => Self::ChatBroadcast(serde_json::from_slice(bytes)?),
            EnvelopeKind::ChatMessage => Self::ChatMessage(serde_json::from_slice(bytes)?),
            EnvelopeKind::CommandResult => Self::CommandResult(serde_json::from_slice(bytes)?),
            EnvelopeKind::ServerStatus => Self::ServerStatus(serde_json::from_slice(bytes)?),
        })
    }

    /// Chat line `"{prefix} {text}"` attributed to `server_id`, with `prefix`
    /// as the sender segment.
    pub fn chat(server_id: &AgentId, prefix: &str, text: &str) -> Self {
        let last = prefix.len().saturating_sub(1);
        Self::ChatMessage(ChatMessage {
            server_id: server_id.to_string(),
            message: format!("{prefix} {text}"),
            message_offset: u32::try_from(last).unwrap_or(u32::MAX),
        })
    }
}

impl From<ServerCommand> for Envelope {
    fn from(p: ServerCommand) -> Self {
        Self::ServerCommand(p)
    }
}

impl From<ChatBroadcast> for Envelope {
    fn from(p: ChatBroadcast) -> Self {
        Self::ChatBroadcast(p)
    }
}

impl From<ChatMessage> for Envelope {
    fn from(p: ChatMessage) -> Self {
        Self::ChatMessage(p)
    }
}

impl From<CommandResult> for Envelope {
    fn from(p: CommandResult) -> Self {
        Self::CommandResult(p)
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
