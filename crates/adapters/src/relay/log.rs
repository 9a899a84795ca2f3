// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log-only relay adapter.

use super::{RelayAdapter, RelayError, RelayMessage};
use async_trait::async_trait;

/// Relay adapter that writes every message to the log.
///
/// Used by the standalone daemon, where no Discord client is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRelayAdapter;

impl LogRelayAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelayAdapter for LogRelayAdapter {
    async fn relay(&self, message: RelayMessage) -> Result<(), RelayError> {
        tracing::info!(
            target: "polychat::relay",
            agent = %message.agent(),
            kind = message.kind(),
            "{}",
            message.render()
        );
        Ok(())
    }
}
