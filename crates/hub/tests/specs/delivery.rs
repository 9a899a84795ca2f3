//! Targeted delivery, reconnects and handshakes.

use std::time::{Duration, Instant};

use polychat_core::{
    AgentId, ChatBroadcast, CommandResult, DeliveryError, Envelope, GenericCommand, Target,
};
use polychat_hub::commands;

use crate::prelude::*;

fn warn_envelope() -> Envelope {
    commands::warn("Notch", "spam").into()
}

#[tokio::test]
async fn send_to_unconnected_agent_is_immediate_not_connected() {
    let (hub, _) = start(config()).await;

    let start = Instant::now();
    let err = hub
        .dispatcher()
        .send_to(&AgentId::new("srv-7"), &warn_envelope())
        .await
        .unwrap_err();

    assert_eq!(err, DeliveryError::NotConnected(AgentId::new("srv-7")));
    assert!(start.elapsed() < Duration::from_millis(100));
    hub.shutdown().await;
}

#[tokio::test]
async fn send_to_connected_agent_is_written() {
    let (hub, _) = start(config()).await;
    let mut agent = Agent::join(&hub, "srv-1").await;

    hub.dispatcher()
        .send_to(&AgentId::new("srv-1"), &warn_envelope())
        .await
        .unwrap();
    assert_eq!(agent.recv().await, warn_envelope());
    hub.shutdown().await;
}

#[tokio::test]
async fn disconnected_agent_is_removed_and_unreachable() {
    let (hub, _) = start(config()).await;
    let agent = Agent::join(&hub, "srv-1").await;
    drop(agent);

    let registry = hub.dispatcher().registry().clone();
    wait_until(|| registry.is_empty()).await;

    let err = hub
        .dispatcher()
        .send_to(&AgentId::new("srv-1"), &warn_envelope())
        .await
        .unwrap_err();
    assert_eq!(err, DeliveryError::NotConnected(AgentId::new("srv-1")));
    hub.shutdown().await;
}

#[tokio::test]
async fn writes_arrive_in_send_order() {
    let (hub, _) = start(config()).await;
    let mut agent = Agent::join(&hub, "srv-1").await;

    for i in 0..30 {
        let envelope = Envelope::ChatBroadcast(ChatBroadcast {
            message: format!("line {i}"),
        });
        hub.dispatcher()
            .send_to(&AgentId::new("srv-1"), &envelope)
            .await
            .unwrap();
    }
    for i in 0..30 {
        assert_eq!(
            agent.recv().await,
            Envelope::ChatBroadcast(ChatBroadcast {
                message: format!("line {i}"),
            })
        );
    }
    hub.shutdown().await;
}

#[tokio::test]
async fn reconnect_supersedes_previous_connection() {
    let (hub, _) = start(config()).await;
    let mut first = Agent::join(&hub, "srv-1").await;
    let mut second = Agent::connect_raw(hub.local_addr(), "srv-1").await;
    let mut info = server_info("srv-1");
    info.server_name = "restarted".to_string();
    second.send(&Envelope::ServerInfo(info)).await;

    first.expect_closed().await;
    let registry = hub.dispatcher().registry().clone();
    wait_until(|| {
        registry
            .lookup(&AgentId::new("srv-1"))
            .is_some_and(|s| s.info().server_name == "restarted")
    })
    .await;

    hub.dispatcher()
        .send_to(&AgentId::new("srv-1"), &warn_envelope())
        .await
        .unwrap();
    assert_eq!(second.recv().await, warn_envelope());
    assert_eq!(hub.dispatcher().connected(), vec![AgentId::new("srv-1")]);
    hub.shutdown().await;
}

#[tokio::test]
async fn failed_handshake_is_never_registered() {
    let (hub, _) = start(config()).await;

    let mut wrong_kind = Agent::connect_raw(hub.local_addr(), "bad").await;
    wrong_kind.send(&warn_envelope()).await;
    wrong_kind.expect_closed().await;

    let mut reserved = Agent::connect_raw(hub.local_addr(), "<all>").await;
    reserved
        .send(&Envelope::ServerInfo(server_info("<all>")))
        .await;
    reserved.expect_closed().await;

    // Silent peers are dropped at the handshake deadline
    let mut silent = Agent::connect_raw(hub.local_addr(), "silent").await;
    silent.expect_closed().await;

    assert!(hub.dispatcher().connected().is_empty());
    hub.shutdown().await;
}

#[tokio::test]
async fn request_returns_agent_result() {
    let (hub, _) = start(config()).await;
    let mut agent = Agent::join(&hub, "srv-1").await;

    let responder = tokio::spawn(async move {
        let Envelope::ServerCommand(command) = agent.recv().await else {
            panic!("expected a server command");
        };
        agent
            .send(&Envelope::CommandResult(CommandResult {
                correlation: command.correlation.clone(),
                success: true,
                detail: format!(
                    "There are 3 of a max of 20 players online ({})",
                    command.command.default_command
                ),
            }))
            .await;
        agent
    });

    let result = hub
        .dispatcher()
        .request(
            &AgentId::new("srv-1"),
            GenericCommand {
                default_command: "list".to_string(),
                discord_command_name: "exec".to_string(),
                discord_channel_id: "1".to_string(),
                args: vec![],
            },
        )
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.detail.ends_with("(list)"));
    let _agent = responder.await.unwrap();
    hub.shutdown().await;
}

#[tokio::test]
async fn sentinel_target_broadcasts() {
    let (hub, _) = start(config()).await;
    let mut a = Agent::join(&hub, "srv-1").await;
    let mut b = Agent::join(&hub, "srv-2").await;

    let delivery = hub
        .moderation()
        .ban(Target::All, "Notch", "42")
        .await
        .unwrap();
    assert_eq!(delivery, polychat_core::Delivery::Broadcast { reached: 2 });

    let expected: Envelope = commands::ban(Target::All, "Notch", "42").into();
    assert_eq!(a.recv().await, expected);
    assert_eq!(b.recv().await, expected);
    hub.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_agent_connections() {
    let (hub, _) = start(config()).await;
    let mut agent = Agent::join(&hub, "srv-1").await;

    hub.shutdown().await;
    agent.expect_closed().await;
}
