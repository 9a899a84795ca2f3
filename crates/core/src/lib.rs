// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! polychat-core: data model shared by the Polychat hub and its adapters

pub mod delivery;
pub mod envelope;
pub mod id;

pub use delivery::{Delivery, DeliveryError, DeliveryResult};
pub use envelope::{
    ChatBroadcast, ChatMessage, CommandResult, Envelope, EnvelopeKind, GenericCommand,
    ServerCommand, ServerInfo, ServerState, ServerStatus,
};
pub use id::{AgentId, CorrelationId, IdError, Target, ALL_AGENTS, MAX_AGENT_ID_LEN};
