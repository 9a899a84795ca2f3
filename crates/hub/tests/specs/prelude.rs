//! Test helpers: a running hub and socket-level fake agents.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use polychat_adapters::FakeRelayAdapter;
use polychat_core::{Envelope, ServerInfo};
use polychat_hub::protocol::{self, Frame, FrameReader, ProtocolError};
use polychat_hub::{BroadcastConfig, Config, Hub};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub const SPEC_WAIT_MAX: Duration = Duration::from_secs(2);
pub const SPEC_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub fn config() -> Config {
    let mut config = Config::default();
    config.hub.listen = "127.0.0.1:0".to_string();
    config.hub.send_timeout_ms = 500;
    config.hub.ack_timeout_ms = 500;
    config.hub.handshake_timeout_ms = 500;
    config.hub.shutdown_grace_ms = 200;
    config
}

pub fn broadcasts(messages: &[&str], interval_secs: u64) -> BroadcastConfig {
    BroadcastConfig {
        id: Some("MMCC".to_string()),
        prefix: Some("[MMCC]".to_string()),
        messages: Some(messages.iter().map(|m| m.to_string()).collect()),
        interval_secs,
    }
}

pub async fn start(config: Config) -> (Hub, FakeRelayAdapter) {
    let relay = FakeRelayAdapter::new();
    let hub = Hub::start(&config, relay.clone()).await.unwrap();
    (hub, relay)
}

pub fn server_info(id: &str) -> ServerInfo {
    ServerInfo {
        server_id: id.to_string(),
        server_name: format!("{id} survival"),
        server_address: format!("{id}.example.net"),
        max_players: 20,
    }
}

/// A fake Minecraft server agent on a real socket
pub struct Agent {
    pub id: String,
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Agent {
    /// Connect without identifying.
    pub async fn connect_raw(addr: SocketAddr, id: &str) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, write) = stream.into_split();
        Self {
            id: id.to_string(),
            reader: FrameReader::new(read),
            writer: write,
        }
    }

    /// Connect, identify, and wait until the hub has registered the agent.
    pub async fn join(hub: &Hub, id: &str) -> Self {
        let mut agent = Self::connect_raw(hub.local_addr(), id).await;
        agent.send(&Envelope::ServerInfo(server_info(id))).await;
        let registry = hub.dispatcher().registry().clone();
        let agent_id = polychat_core::AgentId::new(id);
        wait_until(|| {
            registry
                .lookup(&agent_id)
                .is_some_and(|s| s.info() == &server_info(id))
        })
        .await;
        agent
    }

    pub async fn send(&mut self, envelope: &Envelope) {
        let frame = protocol::encode(envelope).unwrap();
        protocol::write_frame(&mut self.writer, &frame).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        protocol::write_frame(&mut self.writer, bytes).await.unwrap();
    }

    pub async fn recv(&mut self) -> Envelope {
        match self.reader.next_frame_within(SPEC_WAIT_MAX).await {
            Ok(Frame::Envelope(envelope)) => envelope,
            other => panic!("{}: expected an envelope, got {other:?}", self.id),
        }
    }

    pub async fn recv_within(&mut self, wait: Duration) -> Option<Envelope> {
        match self.reader.next_frame_within(wait).await {
            Ok(Frame::Envelope(envelope)) => Some(envelope),
            Err(ProtocolError::Timeout) => None,
            other => panic!("{}: expected an envelope or silence, got {other:?}", self.id),
        }
    }

    /// Expect the hub to close the connection.
    pub async fn expect_closed(&mut self) {
        match self.reader.next_frame_within(SPEC_WAIT_MAX).await {
            Err(ProtocolError::ConnectionClosed) | Err(ProtocolError::Io(_)) => {}
            other => panic!("{}: expected the hub to hang up, got {other:?}", self.id),
        }
    }
}

/// Poll `condition` until it holds; panics after `SPEC_WAIT_MAX`.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(SPEC_WAIT_MAX, async {
        while !condition() {
            tokio::time::sleep(SPEC_POLL_INTERVAL).await;
        }
    })
    .await
    .expect("condition not met in time");
}
