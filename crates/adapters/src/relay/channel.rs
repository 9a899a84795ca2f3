// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel-backed relay adapter.

use super::{RelayAdapter, RelayError, RelayMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Relay adapter that hands messages to whoever owns the receiving end.
///
/// The Discord side of the bot drains the receiver and posts each message.
/// Sends wait for capacity, so a stalled consumer slows the router's
/// dispatch workers rather than growing memory.
#[derive(Clone, Debug)]
pub struct ChannelRelayAdapter {
    tx: mpsc::Sender<RelayMessage>,
}

impl ChannelRelayAdapter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RelayMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RelayAdapter for ChannelRelayAdapter {
    async fn relay(&self, message: RelayMessage) -> Result<(), RelayError> {
        self.tx.send(message).await.map_err(|_| RelayError::Closed)
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
