// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound delivery: targeted sends, broadcasts and acknowledged requests.
//!
//! A targeted send reports a typed [`DeliveryResult`]. A broadcast never
//! fails from the caller's point of view; per-session failures are logged.

use std::time::Duration;

use bytes::Bytes;
use polychat_core::{
    AgentId, CommandResult, Delivery, DeliveryError, DeliveryResult, Envelope, EnvelopeKind,
    GenericCommand, ServerCommand, Target,
};
use tracing::{debug, warn};

use crate::acks::AckTracker;
use crate::protocol;
use crate::registry::Registry;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Deadline for a targeted send to be written
    pub send_timeout: Duration,
    /// Deadline for an acknowledged request to be answered
    pub ack_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(10),
        }
    }
}

/// Cloneable handle used by command handlers and the hub's own tasks
#[derive(Clone)]
pub struct Dispatcher {
    registry: Registry,
    acks: AckTracker,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(registry: Registry, acks: AckTracker, config: DispatchConfig) -> Self {
        Self {
            registry,
            acks,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Deliver `envelope` to one agent and wait for the write.
    ///
    /// Returns `NotConnected` without waiting when the agent has no
    /// session. A timeout abandons only this caller's wait; the session
    /// stays up and may still write the envelope.
    pub async fn send_to(&self, agent: &AgentId, envelope: &Envelope) -> DeliveryResult {
        let Some(session) = self.registry.lookup(agent) else {
            debug!(agent = %agent, kind = %envelope.kind(), "send to unknown agent");
            return Err(DeliveryError::NotConnected(agent.clone()));
        };

        let deadline = self.config.send_timeout;
        let delivery = async {
            let pending = session.enqueue(envelope).await?;
            pending.await
        };
        let result = match tokio::time::timeout(deadline, delivery).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout {
                agent: agent.clone(),
                after: deadline,
            }),
        };

        if let Err(e) = &result {
            warn!(agent = %agent, kind = %envelope.kind(), error = %e, "send failed");
        }
        result
    }

    /// Queue `envelope` on every registered session; returns how many took it.
    pub fn broadcast(&self, envelope: &Envelope) -> usize {
        self.broadcast_filtered(envelope, None)
    }

    /// Like [`Dispatcher::broadcast`], skipping `origin`.
    pub fn broadcast_except(&self, origin: &AgentId, envelope: &Envelope) -> usize {
        self.broadcast_filtered(envelope, Some(origin))
    }

    fn broadcast_filtered(&self, envelope: &Envelope, skip: Option<&AgentId>) -> usize {
        match protocol::encode(envelope) {
            Ok(frame) => self.broadcast_frame(frame, envelope.kind(), skip),
            Err(e) => {
                warn!(kind = %envelope.kind(), error = %e, "broadcast not encodable, dropped");
                0
            }
        }
    }

    /// Fan one encoded frame out to the sessions present right now.
    ///
    /// Sessions registered after the snapshot is taken do not receive it.
    pub fn broadcast_frame(
        &self,
        frame: Bytes,
        kind: EnvelopeKind,
        skip: Option<&AgentId>,
    ) -> usize {
        let snapshot = self.registry.snapshot();
        let mut reached = 0;
        for (agent, session) in snapshot.iter() {
            if skip == Some(agent) {
                continue;
            }
            match session.try_enqueue_frame(frame.clone(), kind) {
                Ok(()) => reached += 1,
                Err(e) => warn!(agent = %agent, %kind, error = %e, "broadcast skipped session"),
            }
        }
        debug!(%kind, reached, sessions = snapshot.len(), "broadcast queued");
        reached
    }

    /// Send to one agent or, for the sentinel target, to all of them.
    pub async fn send(
        &self,
        target: &Target,
        envelope: &Envelope,
    ) -> Result<Delivery, DeliveryError> {
        match target {
            Target::All => Ok(Delivery::Broadcast {
                reached: self.broadcast(envelope),
            }),
            Target::Agent(agent) => self.send_to(agent, envelope).await.map(|()| Delivery::Sent),
        }
    }

    /// Run `command` on one agent and wait for its result.
    pub async fn request(
        &self,
        agent: &AgentId,
        command: GenericCommand,
    ) -> Result<CommandResult, DeliveryError> {
        let waiter = self.acks.register();
        let envelope = Envelope::from(ServerCommand {
            server_id: Target::Agent(agent.clone()),
            command,
            correlation: Some(waiter.correlation().clone()),
        });
        self.send_to(agent, &envelope).await?;
        waiter.wait(agent, self.config.ack_timeout).await
    }

    /// Agents with a registered session
    pub fn connected(&self) -> Vec<AgentId> {
        self.registry.agents()
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
