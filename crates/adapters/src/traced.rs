// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::relay::{RelayAdapter, RelayError, RelayMessage};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any RelayAdapter
#[derive(Clone)]
pub struct TracedRelay<R> {
    inner: R,
}

impl<R> TracedRelay<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: RelayAdapter> RelayAdapter for TracedRelay<R> {
    async fn relay(&self, message: RelayMessage) -> Result<(), RelayError> {
        let agent = message.agent().to_string();
        let kind = message.kind();
        async {
            let start = std::time::Instant::now();
            let result = self.inner.relay(message).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "relayed"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "relay failed"),
            }
            result
        }
        .instrument(tracing::info_span!("relay", agent = %agent, kind))
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
