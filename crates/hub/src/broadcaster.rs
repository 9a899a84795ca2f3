// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic broadcaster: cycles through configured chat lines on a timer.

use std::time::Duration;

use polychat_core::{AgentId, Envelope};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::BroadcastConfig;
use crate::dispatcher::Dispatcher;

/// Schedule state. The rotation position is private to the running task.
#[derive(Debug)]
pub struct Broadcaster {
    source: AgentId,
    prefix: String,
    messages: Vec<String>,
    interval: Duration,
    position: usize,
}

impl Broadcaster {
    /// Returns `None` when any input is empty; broadcasting is then disabled.
    pub fn new(
        source: impl Into<String>,
        prefix: impl Into<String>,
        messages: Vec<String>,
        interval: Duration,
    ) -> Option<Self> {
        let source = source.into();
        let prefix = prefix.into();
        if source.is_empty() || prefix.is_empty() || messages.is_empty() || interval.is_zero() {
            return None;
        }
        Some(Self {
            source: AgentId::new(source),
            prefix,
            messages,
            interval,
            position: 0,
        })
    }

    pub fn from_config(config: &BroadcastConfig) -> Option<Self> {
        let (Some(id), Some(prefix), Some(messages)) =
            (&config.id, &config.prefix, &config.messages)
        else {
            return None;
        };
        Self::new(
            id.as_str(),
            prefix.as_str(),
            messages.clone(),
            Duration::from_secs(config.interval_secs),
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Compose the next line and advance, wrapping at the end of the list.
    pub fn next_envelope(&mut self) -> Envelope {
        let text = &self.messages[self.position % self.messages.len()];
        let envelope = Envelope::chat(&self.source, &self.prefix, text);
        self.position = (self.position + 1) % self.messages.len();
        envelope
    }

    /// Broadcast the next line; returns the number of sessions reached.
    pub fn tick(&mut self, dispatcher: &Dispatcher) -> usize {
        let envelope = self.next_envelope();
        let reached = dispatcher.broadcast(&envelope);
        debug!(reached, position = self.position, "periodic broadcast sent");
        reached
    }

    /// Tick until cancelled; the first tick fires immediately.
    pub async fn run(mut self, dispatcher: Dispatcher, cancel: CancellationToken) {
        info!(
            source = %self.source,
            messages = self.messages.len(),
            interval_secs = self.interval.as_secs(),
            "periodic broadcaster started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(&dispatcher);
                }
            }
        }
        debug!("periodic broadcaster stopped");
    }
}

#[cfg(test)]
#[path = "broadcaster_tests.rs"]
mod tests;
