//! Cross-worker fan-out tests: two workers sharing one cluster bus and one
//! set of stores.
//!
//! Run with: cargo test -p integration-tests --test cluster_tests

use integration_tests::{
    expect_event, no_event, settle, LocalCluster, MemoryMessageStore, MemorySessionStore,
    TestWorker,
};
use pulse_core::SessionId;
use pulse_gateway::protocol::ServerEvent;
use std::sync::Arc;

fn two_workers() -> (TestWorker, TestWorker, Arc<MemorySessionStore>) {
    let cluster = LocalCluster::new();
    let sessions = Arc::new(MemorySessionStore::new());
    let messages = Arc::new(MemoryMessageStore::new());
    let a = TestWorker::spawn(&cluster, 0, sessions.clone(), messages.clone());
    let b = TestWorker::spawn(&cluster, 1, sessions.clone(), messages);
    (a, b, sessions)
}

#[tokio::test]
async fn test_presence_announcement_crosses_workers() {
    let (worker_a, worker_b, _) = two_workers();

    let (_alice, mut alice_rx) = worker_a.connect("alice", (None, None)).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();

    let (bob, mut bob_rx) = worker_b.connect("bob", (Some(3.0), None)).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();

    // Alice sits on worker A; bob's announcement arrives via the bus
    match expect_event(&mut alice_rx).await.unwrap() {
        ServerEvent::UserConnected(entry) => {
            assert_eq!(&entry.user_id, bob.user_id());
            assert_eq!(entry.latitude, Some(3.0));
        }
        other => panic!("expected user connected, got {}", other.name()),
    }

    // The origin worker's dispatcher drops its own echo
    no_event(&mut bob_rx).await.unwrap();
}

#[tokio::test]
async fn test_private_message_crosses_workers() {
    let (worker_a, worker_b, _) = two_workers();

    let (alice, mut alice_rx) = worker_a.connect("alice", (None, None)).await.unwrap();
    let (bob, mut bob_rx) = worker_b.connect("bob", (None, None)).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap(); // bob connected

    worker_a
        .controller
        .private_message(&alice, "across".to_string(), bob.user_id().clone())
        .await;

    match expect_event(&mut bob_rx).await.unwrap() {
        ServerEvent::PrivateMessage(message) => {
            assert_eq!(&message.from, alice.user_id());
            assert_eq!(message.content, "across");
        }
        other => panic!("expected private message, got {}", other.name()),
    }
}

#[tokio::test]
async fn test_local_recipient_gets_message_exactly_once() {
    let (worker_a, _worker_b, _) = two_workers();

    // Both parties on worker A: local delivery happens in-process, and the
    // bus copy must be dropped by the origin's dispatcher.
    let (alice, mut alice_rx) = worker_a.connect("alice", (None, None)).await.unwrap();
    let (bob, mut bob_rx) = worker_a.connect("bob", (None, None)).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();

    worker_a
        .controller
        .private_message(&alice, "once".to_string(), bob.user_id().clone())
        .await;
    settle().await;

    assert!(matches!(
        expect_event(&mut bob_rx).await.unwrap(),
        ServerEvent::PrivateMessage(_)
    ));
    no_event(&mut bob_rx).await.unwrap();
}

#[tokio::test]
async fn test_sender_tab_on_other_worker_sees_sent_message() {
    let (worker_a, worker_b, _) = two_workers();

    let (alice, mut alice_rx) = worker_a.connect("alice", (None, None)).await.unwrap();
    let (_tab, mut tab_rx) = worker_b.connect("alice", (None, None)).await.unwrap();
    let (bob, mut bob_rx) = worker_a.connect("bob", (None, None)).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();
    expect_event(&mut alice_rx).await.unwrap();
    expect_event(&mut tab_rx).await.unwrap();
    expect_event(&mut tab_rx).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();

    worker_a
        .controller
        .private_message(&alice, "multi-tab".to_string(), bob.user_id().clone())
        .await;
    settle().await;

    assert!(matches!(
        expect_event(&mut bob_rx).await.unwrap(),
        ServerEvent::PrivateMessage(_)
    ));
    // The sender's other tab lives on worker B and gets the copy over the bus
    let mut saw_message = false;
    while let Ok(event) = expect_event(&mut tab_rx).await {
        if matches!(event, ServerEvent::PrivateMessage(_)) {
            saw_message = true;
            break;
        }
    }
    assert!(saw_message, "sender's remote tab never saw the message");
}

#[tokio::test]
async fn test_membership_query_unions_workers() {
    let (worker_a, worker_b, _) = two_workers();

    let (alice_a, _rx_a) = worker_a.connect("alice", (None, None)).await.unwrap();
    let (alice_b, _rx_b) = worker_b.connect("alice", (None, None)).await.unwrap();

    use pulse_bus::FanOutBus;
    let members = worker_a
        .bus
        .query_members(alice_a.user_id())
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.contains(&alice_a.socket_id()));
    assert!(members.contains(&alice_b.socket_id()));
}

#[tokio::test]
async fn test_disconnect_waits_for_all_workers() {
    let (worker_a, worker_b, sessions) = two_workers();

    let (alice_a, _rx_a) = worker_a.connect("alice", (None, None)).await.unwrap();
    let (alice_b, _rx_b) = worker_b.connect("alice", (None, None)).await.unwrap();
    let (_bob, mut bob_rx) = worker_a.connect("bob", (None, None)).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();
    expect_event(&mut bob_rx).await.unwrap();

    // First tab closes; alice still holds a socket on worker B
    worker_a.controller.disconnect(&alice_a).await.unwrap();
    no_event(&mut bob_rx).await.unwrap();
    assert!(sessions.record(&SessionId::new("alice")).unwrap().connected);

    // Last tab closes; now the union is empty and the announcement fires
    worker_b.controller.disconnect(&alice_b).await.unwrap();
    match expect_event(&mut bob_rx).await.unwrap() {
        ServerEvent::UserDisconnected(user_id) => assert_eq!(&user_id, alice_a.user_id()),
        other => panic!("expected user disconnected, got {}", other.name()),
    }
    assert!(!sessions.record(&SessionId::new("alice")).unwrap().connected);
}
