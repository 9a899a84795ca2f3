// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory agents for unit tests.

#![cfg_attr(coverage_nightly, coverage(off))]

use std::sync::Arc;
use std::time::Duration;

use polychat_core::{AgentId, Envelope, ServerInfo};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

use crate::protocol::{self, Frame, FrameReader, ProtocolError};
use crate::registry::Registry;
use crate::router::{self, Inbound, InboundSender};
use crate::session::{Session, SessionConfig, SessionContext};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) fn server_info(id: &str) -> ServerInfo {
    ServerInfo {
        server_id: id.to_string(),
        server_name: format!("{id} survival"),
        server_address: format!("{id}.example.net"),
        max_players: 20,
    }
}

/// Registry plus router inbox, without a router running
pub(crate) struct TestHub {
    pub registry: Registry,
    pub inbound: InboundSender,
    pub inbox: mpsc::Receiver<Inbound>,
    pub config: SessionConfig,
}

impl TestHub {
    pub fn new() -> Self {
        Self::with_config(SessionConfig {
            outbound_queue: 16,
            enqueue_wait: Duration::from_millis(50),
            shutdown_grace: Duration::from_millis(500),
        })
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let (inbound, inbox) = router::inbox(64);
        Self {
            registry: Registry::new(),
            inbound,
            inbox,
            config,
        }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            registry: self.registry.clone(),
            inbound: self.inbound.clone(),
            config: self.config.clone(),
        }
    }

    /// Connect an agent over an in-memory pipe of `capacity` bytes.
    pub fn connect_with_capacity(&self, id: &str, capacity: usize) -> TestAgent {
        let (hub_side, agent_side) = tokio::io::duplex(capacity);
        let (hub_read, hub_write) = tokio::io::split(hub_side);
        let session = Session::start(
            AgentId::new(id),
            server_info(id),
            format!("memory:{id}"),
            FrameReader::new(hub_read),
            hub_write,
            &self.context(),
        );
        let (agent_read, agent_write) = tokio::io::split(agent_side);
        TestAgent {
            session,
            reader: FrameReader::new(agent_read),
            writer: agent_write,
        }
    }

    pub fn connect(&self, id: &str) -> TestAgent {
        self.connect_with_capacity(id, 64 * 1024)
    }
}

/// Remote end of an in-memory session
pub(crate) struct TestAgent {
    pub session: Arc<Session>,
    pub reader: FrameReader<ReadHalf<DuplexStream>>,
    pub writer: WriteHalf<DuplexStream>,
}

impl TestAgent {
    /// Next envelope written by the hub; panics after a timeout.
    pub async fn recv(&mut self) -> Envelope {
        match self.reader.next_frame_within(RECV_TIMEOUT).await {
            Ok(Frame::Envelope(envelope)) => envelope,
            other => panic!("expected an envelope, got {other:?}"),
        }
    }

    /// Next envelope within `wait`, or `None` if nothing arrives.
    pub async fn recv_within(&mut self, wait: Duration) -> Option<Envelope> {
        match self.reader.next_frame_within(wait).await {
            Ok(Frame::Envelope(envelope)) => Some(envelope),
            Err(ProtocolError::Timeout) => None,
            other => panic!("expected an envelope or silence, got {other:?}"),
        }
    }

    /// Write an envelope as the agent.
    pub async fn send(&mut self, envelope: &Envelope) {
        let frame = protocol::encode(envelope).unwrap();
        protocol::write_frame(&mut self.writer, &frame).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        protocol::write_frame(&mut self.writer, bytes).await.unwrap();
    }
}

/// Wait until `agent` is no longer registered.
pub(crate) async fn wait_unregistered(registry: &Registry, agent: &str) {
    let agent = AgentId::new(agent);
    tokio::time::timeout(RECV_TIMEOUT, async {
        while registry.lookup(&agent).is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{agent} still registered"));
}
