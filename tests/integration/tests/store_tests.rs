//! Store contract tests against the in-memory doubles, which mirror the
//! Redis implementations' merge and first-save semantics.

use integration_tests::memory::{MemoryMessageStore, MemorySessionStore};
use pulse_core::{
    MessageRecord, MessageStore, SessionId, SessionPatch, SessionRecord, SessionStore, UserId,
};

fn sid(s: &str) -> SessionId {
    SessionId::new(s)
}

fn uid(s: &str) -> UserId {
    UserId::new(s)
}

#[tokio::test]
async fn test_save_find_round_trip() {
    let store = MemorySessionStore::new();
    let patch = SessionPatch::connect(uid("u1"), "alice", Some(52.5), Some(13.4));
    store.save_session(&sid("alice"), patch).await.unwrap();

    let found = store.find_session(&sid("alice")).await.unwrap().unwrap();
    assert_eq!(
        found,
        SessionRecord {
            session_id: sid("alice"),
            user_id: uid("u1"),
            username: "alice".to_string(),
            connected: true,
            latitude: Some(52.5),
            longitude: Some(13.4),
        }
    );
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let store = MemorySessionStore::new();
    assert!(store.find_session(&sid("ghost")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_patch_preserves_identity() {
    let store = MemorySessionStore::new();
    let connect = SessionPatch::connect(uid("u1"), "alice", None, None);
    store.save_session(&sid("alice"), connect).await.unwrap();

    store
        .save_session(&sid("alice"), SessionPatch::position(Some(1.0), Some(2.0)))
        .await
        .unwrap();
    store
        .save_session(&sid("alice"), SessionPatch::disconnect())
        .await
        .unwrap();

    let found = store.find_session(&sid("alice")).await.unwrap().unwrap();
    assert_eq!(found.user_id, uid("u1"));
    assert_eq!(found.username, "alice");
    assert!(!found.connected);
    assert!(found.latitude.is_none());
    assert!(found.longitude.is_none());
}

#[tokio::test]
async fn test_first_save_without_identity_is_rejected() {
    let store = MemorySessionStore::new();
    let result = store
        .save_session(&sid("alice"), SessionPatch::position(Some(1.0), None))
        .await;
    assert!(result.is_err());
    assert!(store.find_session(&sid("alice")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_all_sessions_returns_every_record() {
    let store = MemorySessionStore::new();
    for name in ["alice", "bob", "carol"] {
        let patch = SessionPatch::connect(uid(&format!("u-{name}")), name, None, None);
        store.save_session(&sid(name), patch).await.unwrap();
    }

    let mut all = store.find_all_sessions().await.unwrap();
    all.sort_by(|a, b| a.username.cmp(&b.username));
    let names: Vec<&str> = all.iter().map(|r| r.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
}

#[tokio::test]
async fn test_message_visible_to_both_participants() {
    let store = MemoryMessageStore::new();
    let record = MessageRecord::new(uid("a"), uid("b"), "hello");
    store.save_message(&record).await.unwrap();

    let for_sender = store.messages_for_user(&uid("a")).await.unwrap();
    let for_recipient = store.messages_for_user(&uid("b")).await.unwrap();
    assert_eq!(for_sender, vec![record.clone()]);
    assert_eq!(for_recipient, vec![record]);

    assert!(store.messages_for_user(&uid("c")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_messages_keep_storage_order() {
    let store = MemoryMessageStore::new();
    for i in 0..5 {
        let record = MessageRecord::new(uid("a"), uid("b"), format!("m{i}"));
        store.save_message(&record).await.unwrap();
    }

    let history = store.messages_for_user(&uid("b")).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
}
