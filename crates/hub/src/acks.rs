// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Correlates command results with the requests that caused them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use polychat_core::{AgentId, CommandResult, CorrelationId, DeliveryError};
use tokio::sync::oneshot;
use tracing::debug;

/// Table of requests waiting for a `CommandResult`
#[derive(Clone, Default)]
pub struct AckTracker {
    pending: Arc<Mutex<HashMap<CorrelationId, oneshot::Sender<CommandResult>>>>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a correlation id and a waiter for its result.
    pub fn register(&self) -> AckWaiter {
        let correlation = CorrelationId::generate();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(correlation.clone(), tx);
        AckWaiter {
            correlation,
            rx,
            tracker: self.clone(),
        }
    }

    /// Hand `result` to whoever is waiting for it.
    ///
    /// Gives the result back when nobody is: it carries no correlation, the
    /// correlation is unknown, or the waiter has gone away.
    pub fn resolve(&self, result: CommandResult) -> Result<(), CommandResult> {
        let waiter = result
            .correlation
            .as_ref()
            .and_then(|correlation| self.pending.lock().remove(correlation));
        let Some(tx) = waiter else {
            debug!(correlation = ?result.correlation, "no waiter for command result");
            return Err(result);
        };
        tx.send(result)
    }

    /// Number of requests still waiting
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    fn forget(&self, correlation: &CorrelationId) {
        self.pending.lock().remove(correlation);
    }
}

/// One outstanding request. Dropping it withdraws the request.
pub struct AckWaiter {
    correlation: CorrelationId,
    rx: oneshot::Receiver<CommandResult>,
    tracker: AckTracker,
}

impl AckWaiter {
    pub fn correlation(&self) -> &CorrelationId {
        &self.correlation
    }

    /// Wait up to `timeout` for the result from `agent`.
    pub async fn wait(
        mut self,
        agent: &AgentId,
        timeout: Duration,
    ) -> Result<CommandResult, DeliveryError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(DeliveryError::NotConnected(agent.clone())),
            Err(_) => Err(DeliveryError::Timeout {
                agent: agent.clone(),
                after: timeout,
            }),
        }
    }
}

impl Drop for AckWaiter {
    fn drop(&mut self) {
        self.tracker.forget(&self.correlation);
    }
}

#[cfg(test)]
#[path = "acks_tests.rs"]
mod tests;
