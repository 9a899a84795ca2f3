// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Moderation commands issued from Discord.
//!
//! The free functions build envelopes; [`Moderation`] sends them and maps
//! delivery failures to the message shown to the moderator.

use polychat_core::{
    AgentId, ChatBroadcast, Delivery, DeliveryError, Envelope, GenericCommand, ServerCommand,
    Target,
};
use thiserror::Error;
use tracing::info;

use crate::dispatcher::Dispatcher;

/// Server id that Discord chat is attributed to
pub const DISCORD_SERVER_ID: &str = "Discord";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Could not reach server {target}. Please see the logs.")]
    Unreachable {
        target: Target,
        #[source]
        source: DeliveryError,
    },

    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
}

fn generic(
    target: Target,
    default_command: &str,
    discord_command_name: &str,
    channel_id: &str,
    args: Vec<String>,
) -> ServerCommand {
    ServerCommand {
        server_id: target,
        command: GenericCommand {
            default_command: default_command.to_string(),
            discord_command_name: discord_command_name.to_string(),
            discord_channel_id: channel_id.to_string(),
            args,
        },
        correlation: None,
    }
}

/// Ban `ign`; the agent reports back in `channel_id`.
pub fn ban(target: Target, ign: &str, channel_id: &str) -> ServerCommand {
    generic(target, "ban", "ban", channel_id, vec![ign.to_string()])
}

pub fn unban(target: Target, ign: &str, channel_id: &str) -> ServerCommand {
    generic(target, "unban", "unban", channel_id, vec![ign.to_string()])
}

/// Run an arbitrary console command.
pub fn exec(target: Target, command: &str, args: Vec<String>, channel_id: &str) -> ServerCommand {
    generic(target, command, "exec", channel_id, args)
}

/// In-game warning shown to every player.
pub fn warn(ign: &str, reason: &str) -> ChatBroadcast {
    ChatBroadcast {
        message: format!("You have been warned, @{ign}. Reason: {reason}"),
    }
}

/// A Discord user's message, formatted like in-game chat.
pub fn discord_chat(author: &str, text: &str) -> Envelope {
    Envelope::chat(
        &AgentId::new(DISCORD_SERVER_ID),
        &format!("<{author}>"),
        text,
    )
}

fn validate_ign(ign: &str) -> Result<(), CommandError> {
    if ign.is_empty() {
        return Err(CommandError::InvalidArgument {
            field: "ign",
            reason: "must not be empty".to_string(),
        });
    }
    if ign.chars().any(char::is_whitespace) {
        return Err(CommandError::InvalidArgument {
            field: "ign",
            reason: format!("{ign:?} contains whitespace"),
        });
    }
    Ok(())
}

/// Sends moderation commands through the dispatcher.
#[derive(Clone)]
pub struct Moderation {
    dispatcher: Dispatcher,
}

impl Moderation {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub async fn ban(
        &self,
        target: Target,
        ign: &str,
        channel_id: &str,
    ) -> Result<Delivery, CommandError> {
        validate_ign(ign)?;
        info!(%target, ign, "ban");
        self.dispatch(target.clone(), ban(target, ign, channel_id).into())
            .await
    }

    pub async fn unban(
        &self,
        target: Target,
        ign: &str,
        channel_id: &str,
    ) -> Result<Delivery, CommandError> {
        validate_ign(ign)?;
        info!(%target, ign, "unban");
        self.dispatch(target.clone(), unban(target, ign, channel_id).into())
            .await
    }

    pub async fn warn(
        &self,
        target: Target,
        ign: &str,
        reason: &str,
    ) -> Result<Delivery, CommandError> {
        validate_ign(ign)?;
        info!(%target, ign, "warn");
        self.dispatch(target, warn(ign, reason).into()).await
    }

    pub async fn exec(
        &self,
        target: Target,
        command: &str,
        args: Vec<String>,
        channel_id: &str,
    ) -> Result<Delivery, CommandError> {
        if command.trim().is_empty() {
            return Err(CommandError::InvalidArgument {
                field: "command",
                reason: "must not be empty".to_string(),
            });
        }
        info!(%target, command, "exec");
        self.dispatch(target.clone(), exec(target, command, args, channel_id).into())
            .await
    }

    /// Forward Discord chat to every agent; returns how many it reached.
    pub fn discord_chat(&self, author: &str, text: &str) -> usize {
        self.dispatcher.broadcast(&discord_chat(author, text))
    }

    async fn dispatch(&self, target: Target, envelope: Envelope) -> Result<Delivery, CommandError> {
        self.dispatcher
            .send(&target, &envelope)
            .await
            .map_err(|source| CommandError::Unreachable { target, source })
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
