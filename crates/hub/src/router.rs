// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound routing: decoded envelopes from agents go to Discord, the ack
//! tracker, or back out to the other agents.
//!
//! Sessions push into a bounded inbox without waiting; a full inbox drops
//! the envelope so one noisy agent cannot stall another's read path. Routing
//! itself never waits: acks and forwarding happen inline, relay calls are
//! handed to a bounded worker pool and dropped when its backlog is full.

use std::sync::Arc;

use polychat_adapters::{RelayAdapter, RelayMessage};
use polychat_core::{AgentId, Envelope};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::acks::AckTracker;
use crate::dispatcher::Dispatcher;

/// One envelope read from an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub agent: AgentId,
    pub envelope: Envelope,
}

/// Producer side of the router inbox, held by every session
#[derive(Clone)]
pub struct InboundSender {
    tx: mpsc::Sender<Inbound>,
}

impl InboundSender {
    /// Hand an envelope to the router without waiting. Returns false if dropped.
    pub fn deliver(&self, inbound: Inbound) -> bool {
        match self.tx.try_send(inbound) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(inbound)) => {
                warn!(
                    agent = %inbound.agent,
                    kind = %inbound.envelope.kind(),
                    "router inbox full, dropping envelope"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(inbound)) => {
                debug!(agent = %inbound.agent, "router stopped, dropping envelope");
                false
            }
        }
    }
}

/// Create the router inbox.
pub fn inbox(capacity: usize) -> (InboundSender, mpsc::Receiver<Inbound>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (InboundSender { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Concurrent relay calls
    pub relay_workers: usize,
    /// Relay calls allowed to wait for a worker
    pub relay_backlog: usize,
    /// Re-broadcast agent chat to the other agents
    pub forward_chat: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            relay_workers: 4,
            relay_backlog: 256,
            forward_chat: true,
        }
    }
}

pub struct InboundRouter<R> {
    relay: R,
    dispatcher: Dispatcher,
    acks: AckTracker,
    workers: Arc<Semaphore>,
    backlog: Arc<Semaphore>,
    forward_chat: bool,
}

impl<R: RelayAdapter> InboundRouter<R> {
    pub fn new(relay: R, dispatcher: Dispatcher, acks: AckTracker, config: RouterConfig) -> Self {
        Self {
            relay,
            dispatcher,
            acks,
            workers: Arc::new(Semaphore::new(config.relay_workers.max(1))),
            backlog: Arc::new(Semaphore::new(
                config.relay_workers.max(1) + config.relay_backlog,
            )),
            forward_chat: config.forward_chat,
        }
    }

    /// Route inbox entries until cancelled or every sender is gone.
    pub async fn run(self, mut inbox: mpsc::Receiver<Inbound>, cancel: CancellationToken) {
        loop {
            let inbound = tokio::select! {
                _ = cancel.cancelled() => break,
                inbound = inbox.recv() => inbound,
            };
            let Some(inbound) = inbound else { break };
            self.route(inbound);
        }
        debug!("inbound router stopped");
    }

    /// Route one envelope without waiting on any consumer.
    pub fn route(&self, inbound: Inbound) {
        let Inbound { agent, envelope } = inbound;
        let kind = envelope.kind();
        match envelope {
            Envelope::ChatMessage(chat) => {
                let (sender, body) = chat.split();
                let message = RelayMessage::Chat {
                    agent: agent.clone(),
                    sender: sender.to_string(),
                    body: body.to_string(),
                };
                if self.forward_chat {
                    self.dispatcher
                        .broadcast_except(&agent, &Envelope::ChatMessage(chat));
                }
                self.relay(message);
            }
            Envelope::ServerStatus(status) => {
                if status.server_id != agent.as_str() {
                    debug!(
                        agent = %agent,
                        reported = %status.server_id,
                        "status names another server"
                    );
                }
                self.relay(RelayMessage::Status {
                    agent,
                    state: status.state,
                });
            }
            Envelope::CommandResult(result) => {
                if let Err(result) = self.acks.resolve(result) {
                    self.relay(RelayMessage::CommandOutput {
                        agent,
                        success: result.success,
                        detail: result.detail,
                    });
                }
            }
            Envelope::ServerInfo(_) | Envelope::ServerCommand(_) | Envelope::ChatBroadcast(_) => {
                warn!(agent = %agent, %kind, "dropping hub-bound envelope of outbound kind");
            }
        }
    }

    /// Hand one relay call to the worker pool, or drop it if the backlog is full.
    fn relay(&self, message: RelayMessage) -> bool {
        let Ok(queued) = Arc::clone(&self.backlog).try_acquire_owned() else {
            warn!(agent = %message.agent(), "relay backlog full, dropping message");
            return false;
        };
        let workers = Arc::clone(&self.workers);
        let relay = self.relay.clone();
        tokio::spawn(async move {
            let _queued = queued;
            let Ok(_worker) = workers.acquire_owned().await else {
                return;
            };
            let agent = message.agent().clone();
            if let Err(e) = relay.relay(message).await {
                warn!(agent = %agent, error = %e, "relay to discord failed");
            }
        });
        true
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
