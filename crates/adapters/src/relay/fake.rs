// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake relay adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{RelayAdapter, RelayError, RelayMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct FakeRelayState {
    calls: Vec<RelayMessage>,
    fail: bool,
    delay: Option<Duration>,
}

/// Fake relay adapter for testing
#[derive(Clone)]
pub struct FakeRelayAdapter {
    inner: Arc<Mutex<FakeRelayState>>,
    recorded: Arc<Notify>,
}

impl Default for FakeRelayAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeRelayState {
                calls: Vec::new(),
                fail: false,
                delay: None,
            })),
            recorded: Arc::new(Notify::new()),
        }
    }
}

impl FakeRelayAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded relay messages
    pub fn calls(&self) -> Vec<RelayMessage> {
        self.inner.lock().calls.clone()
    }

    /// Make subsequent relay calls fail (after recording them)
    pub fn set_fail(&self, fail: bool) {
        self.inner.lock().fail = fail;
    }

    /// Delay every relay call before recording it
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().delay = Some(delay);
    }

    /// Wait until at least `n` messages have been recorded
    pub async fn wait_for(&self, n: usize) -> Vec<RelayMessage> {
        loop {
            let notified = self.recorded.notified();
            {
                let inner = self.inner.lock();
                if inner.calls.len() >= n {
                    return inner.calls.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RelayAdapter for FakeRelayAdapter {
    async fn relay(&self, message: RelayMessage) -> Result<(), RelayError> {
        let delay = self.inner.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let fail = {
            let mut inner = self.inner.lock();
            inner.calls.push(message);
            inner.fail
        };
        self.recorded.notify_waiters();
        if fail {
            return Err(RelayError::Failed("fake failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
