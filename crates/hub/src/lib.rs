// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! polychat-hub: the central relay between Minecraft server agents and Discord.
//!
//! Agents connect over TCP, identify themselves, and then exchange framed
//! envelopes with the hub. The [`Hub`] wires the pieces together:
//!
//! - [`protocol`]: frame codec
//! - [`session`]: per-connection read/write tasks
//! - [`registry`]: live sessions by agent id
//! - [`dispatcher`]: targeted sends, broadcasts, acknowledged requests
//! - [`router`]: inbound envelopes to Discord and the other agents
//! - [`broadcaster`]: periodic chat announcements

pub mod acks;
pub mod broadcaster;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod session;

#[cfg(test)]
mod test_support;

pub use acks::{AckTracker, AckWaiter};
pub use broadcaster::Broadcaster;
pub use commands::{CommandError, Moderation};
pub use config::{BroadcastConfig, Config, ConfigError, HubConfig};
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use lifecycle::{Hub, LifecycleError, Paths};
pub use listener::{HandshakeError, Listener};
pub use protocol::{CodecError, ProtocolError};
pub use registry::Registry;
pub use router::{Inbound, InboundRouter, InboundSender, RouterConfig};
pub use session::{CloseReason, PendingDelivery, Session, SessionConfig, SessionState};
