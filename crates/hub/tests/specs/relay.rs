//! Agent traffic headed for Discord and the other agents.

use std::time::Duration;

use polychat_adapters::RelayMessage;
use polychat_core::{AgentId, ChatMessage, CommandResult, Envelope, ServerState, ServerStatus};

use crate::prelude::*;

#[tokio::test]
async fn chat_is_relayed_and_forwarded() {
    let (hub, relay) = start(config()).await;
    let mut origin = Agent::join(&hub, "srv-1").await;
    let mut other = Agent::join(&hub, "srv-2").await;

    let chat = Envelope::ChatMessage(ChatMessage {
        server_id: "srv-1".to_string(),
        message: "<Alex> who wants to trade diamonds".to_string(),
        message_offset: 5,
    });
    origin.send(&chat).await;

    assert_eq!(
        relay.wait_for(1).await,
        vec![RelayMessage::Chat {
            agent: AgentId::new("srv-1"),
            sender: "<Alex>".to_string(),
            body: "who wants to trade diamonds".to_string(),
        }]
    );
    assert_eq!(other.recv().await, chat);
    assert_eq!(origin.recv_within(Duration::from_millis(100)).await, None);
    hub.shutdown().await;
}

#[tokio::test]
async fn status_and_unsolicited_results_are_relayed() {
    let (hub, relay) = start(config()).await;
    let mut agent = Agent::join(&hub, "srv-1").await;

    agent
        .send(&Envelope::ServerStatus(ServerStatus {
            server_id: "srv-1".to_string(),
            state: ServerState::Crashed,
        }))
        .await;
    relay.wait_for(1).await;
    agent
        .send(&Envelope::CommandResult(CommandResult {
            correlation: None,
            success: true,
            detail: "Saved the game".to_string(),
        }))
        .await;

    let calls = relay.wait_for(2).await;
    assert_eq!(
        calls,
        vec![
            RelayMessage::Status {
                agent: AgentId::new("srv-1"),
                state: ServerState::Crashed,
            },
            RelayMessage::CommandOutput {
                agent: AgentId::new("srv-1"),
                success: true,
                detail: "Saved the game".to_string(),
            },
        ]
    );
    hub.shutdown().await;
}

#[tokio::test]
async fn unknown_kind_is_skipped_without_disconnecting() {
    let (hub, relay) = start(config()).await;
    let mut agent = Agent::join(&hub, "srv-1").await;

    agent.send_raw(&[0, 0, 0, 3, 200, b'{', b'}']).await;
    agent
        .send(&Envelope::ServerStatus(ServerStatus {
            server_id: "srv-1".to_string(),
            state: ServerState::Started,
        }))
        .await;

    relay.wait_for(1).await;
    assert_eq!(hub.dispatcher().connected(), vec![AgentId::new("srv-1")]);
    hub.shutdown().await;
}

#[tokio::test]
async fn malformed_frame_disconnects_only_that_agent() {
    let (hub, _) = start(config()).await;
    let mut bad = Agent::join(&hub, "srv-1").await;
    let mut good = Agent::join(&hub, "srv-2").await;

    // Declares a 16 MiB frame
    bad.send_raw(&[1, 0, 0, 0, 4]).await;
    bad.expect_closed().await;

    let registry = hub.dispatcher().registry().clone();
    wait_until(|| registry.lookup(&AgentId::new("srv-1")).is_none()).await;

    let envelope: Envelope = polychat_hub::commands::warn("Alex", "afk farming").into();
    hub.dispatcher()
        .send_to(&AgentId::new("srv-2"), &envelope)
        .await
        .unwrap();
    assert_eq!(good.recv().await, envelope);
    hub.shutdown().await;
}
