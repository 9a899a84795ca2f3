//! Fan-out and the periodic broadcaster.

use std::time::Duration;

use polychat_core::{AgentId, ChatMessage, Envelope};

use crate::prelude::*;

fn announcement(text: &str) -> Envelope {
    Envelope::ChatMessage(ChatMessage {
        server_id: "MMCC".to_string(),
        message: format!("[MMCC] {text}"),
        message_offset: 5,
    })
}

#[tokio::test]
async fn broadcast_reaches_everyone_even_with_a_stalled_agent() {
    let (hub, _) = start(config()).await;
    let mut srv_1 = Agent::join(&hub, "srv-1").await;
    // srv-2 never reads
    let _srv_2 = Agent::join(&hub, "srv-2").await;
    let mut srv_3 = Agent::join(&hub, "srv-3").await;

    let chat = Envelope::chat(&AgentId::new("Discord"), "<Alex>", "server restart in 5");
    assert_eq!(hub.dispatcher().broadcast(&chat), 3);

    assert_eq!(srv_1.recv().await, chat);
    assert_eq!(srv_3.recv().await, chat);
    hub.shutdown().await;
}

#[tokio::test]
async fn periodic_broadcasts_cycle_through_messages() {
    let mut config = config();
    config.broadcasts = broadcasts(&["hello", "world"], 1);
    let (hub, _) = start(config).await;
    assert!(hub.broadcasting());
    let mut agent = Agent::join(&hub, "srv-1").await;

    // The immediate first tick may land before the agent joined
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(agent.recv().await);
    }
    let hello = announcement("hello");
    let world = announcement("world");
    assert!(
        seen == vec![hello.clone(), world.clone(), hello.clone()]
            || seen == vec![world.clone(), hello.clone(), world.clone()],
        "unexpected rotation: {seen:?}"
    );
    hub.shutdown().await;
}

#[tokio::test]
async fn empty_message_list_never_broadcasts() {
    let mut config = config();
    config.broadcasts = broadcasts(&[], 1);
    let (hub, _) = start(config).await;
    assert!(!hub.broadcasting());

    let mut agent = Agent::join(&hub, "srv-1").await;
    assert_eq!(agent.recv_within(Duration::from_millis(1200)).await, None);
    hub.shutdown().await;
}
