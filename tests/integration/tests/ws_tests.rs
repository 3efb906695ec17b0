//! End-to-end WebSocket tests: a real axum server with in-memory stores
//! and the in-process cluster bus, driven by a tungstenite client.
//!
//! Run with: cargo test -p integration-tests --test ws_tests

use futures_util::{SinkExt, StreamExt};
use integration_tests::{LocalCluster, MemoryMessageStore, MemorySessionStore, TestWorker};
use pulse_common::{AppConfig, AppSettings, BalancingStrategy, ClusterConfig, Environment, RedisConfig, ServerConfig};
use pulse_gateway::server::{create_app, GatewayState};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn test_config() -> AppConfig {
    AppConfig {
        app: AppSettings {
            name: "pulse".to_string(),
            env: Environment::Development,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        redis: RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 4,
        },
        cluster: ClusterConfig {
            worker_id: 0,
            workers_count: 1,
            balancing: BalancingStrategy::LeastConnection,
            membership_timeout_ms: 250,
        },
    }
}

/// Serve the gateway on an ephemeral port, backed by in-memory stores.
async fn spawn_server() -> SocketAddr {
    let cluster = LocalCluster::new();
    let sessions = Arc::new(MemorySessionStore::new());
    let messages = Arc::new(MemoryMessageStore::new());
    let worker = TestWorker::spawn(&cluster, 0, sessions, messages);

    let state = GatewayState::new(worker.controller.clone(), test_config());
    let app = create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

async fn recv_frame(
    ws: &mut (impl futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("invalid frame json");
        }
    }
}

#[tokio::test]
async fn test_handshake_without_username_is_rejected() {
    let addr = spawn_server().await;
    let url = format!("ws://{addr}/ws");

    let err = tokio_tungstenite::connect_async(&url).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_session_and_roster_on_connect() {
    let addr = spawn_server().await;
    let url = format!("ws://{addr}/ws?username=alice&latitd=52.5&longitd=13.4");

    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.expect("connect failed");

    let session = recv_frame(&mut ws).await;
    assert_eq!(session["event"], "session");
    assert_eq!(session["data"]["sessionID"], "alice");
    let user_id = session["data"]["userID"].as_str().expect("no userID").to_string();

    let users = recv_frame(&mut ws).await;
    assert_eq!(users["event"], "users");
    let roster = users["data"].as_array().expect("roster not an array");
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["userID"], user_id.as_str());
    assert_eq!(roster[0]["latitude"], 52.5);
    assert_eq!(roster[0]["connected"], true);
}

#[tokio::test]
async fn test_private_message_between_sockets() {
    let addr = spawn_server().await;

    let (mut alice, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?username=alice"))
        .await
        .expect("alice connect failed");
    let alice_session = recv_frame(&mut alice).await;
    let _alice_roster = recv_frame(&mut alice).await;
    let alice_id = alice_session["data"]["userID"].as_str().unwrap().to_string();

    let (mut bob, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?username=bob"))
        .await
        .expect("bob connect failed");
    let bob_session = recv_frame(&mut bob).await;
    let _bob_roster = recv_frame(&mut bob).await;
    let bob_id = bob_session["data"]["userID"].as_str().unwrap().to_string();

    // Alice sees bob come online
    let connected = recv_frame(&mut alice).await;
    assert_eq!(connected["event"], "user connected");
    assert_eq!(connected["data"]["userID"], bob_id.as_str());

    let frame = serde_json::json!({
        "event": "private message",
        "data": { "content": "hello bob", "to": bob_id },
    });
    alice
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("send failed");

    let received = recv_frame(&mut bob).await;
    assert_eq!(received["event"], "private message");
    assert_eq!(received["data"]["content"], "hello bob");
    assert_eq!(received["data"]["from"], alice_id.as_str());
}

#[tokio::test]
async fn test_disconnect_announced_after_socket_close() {
    let addr = spawn_server().await;

    let (mut alice, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?username=alice"))
        .await
        .expect("alice connect failed");
    let alice_session = recv_frame(&mut alice).await;
    let _ = recv_frame(&mut alice).await;
    let alice_id = alice_session["data"]["userID"].as_str().unwrap().to_string();

    let (mut bob, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?username=bob"))
        .await
        .expect("bob connect failed");
    let _ = recv_frame(&mut bob).await;
    let _ = recv_frame(&mut bob).await;
    let _ = recv_frame(&mut alice).await; // bob connected

    alice.close(None).await.expect("close failed");

    let disconnected = recv_frame(&mut bob).await;
    assert_eq!(disconnected["event"], "user disconnected");
    assert_eq!(disconnected["data"], alice_id.as_str());
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_server().await;

    let stream = tokio::net::TcpStream::connect(addr).await.expect("tcp connect failed");
    let (mut read_half, mut write_half) = stream.into_split();
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    write_half
        .write_all(format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .expect("write failed");
    let mut response = String::new();
    read_half.read_to_string(&mut response).await.expect("read failed");
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("OK"));
}
