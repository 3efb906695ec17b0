//! WebSocket handler
//!
//! Authenticates the handshake, drives the socket's receive and send
//! loops, and runs disconnect handling when either side closes.

use crate::connection::Connection;
use crate::lifecycle::AuthError;
use crate::protocol::{ClientEvent, Frame, Handshake, ServerEvent};
use crate::server::GatewayState;
use axum::{
    extract::{ws::Message, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// WebSocket upgrade handler.
///
/// Authentication happens before the upgrade so a rejected handshake
/// surfaces as an HTTP error instead of an immediately closed socket.
pub async fn ws_handler(
    State(state): State<GatewayState>,
    Query(handshake): Query<Handshake>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match state.controller().authenticate(&handshake).await {
        Ok(identity) => identity,
        Err(AuthError::InvalidUsername) => {
            return (StatusCode::UNAUTHORIZED, "invalid username").into_response();
        }
        Err(AuthError::Store(e)) => {
            tracing::error!(error = %e, "Session lookup failed during handshake");
            if e.is_fatal() {
                fail_fast(&e);
            }
            return (StatusCode::SERVICE_UNAVAILABLE, "session store unavailable")
                .into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, socket, identity))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(
    state: GatewayState,
    socket: axum::extract::ws::WebSocket,
    identity: crate::lifecycle::Identity,
) {
    let (connection, rx) = match state.controller().connect(identity).await {
        Ok(pair) => pair,
        Err(e) => {
            if e.is_fatal() {
                fail_fast(&e);
            }
            tracing::error!(error = %e, "Failed to activate connection");
            return;
        }
    };

    tracing::info!(
        socket_id = %connection.socket_id(),
        user_id = %connection.user_id(),
        "WebSocket connection established"
    );

    let (ws_sink, ws_stream) = socket.split();
    let send_task = tokio::spawn(run_send_loop(ws_sink, rx));

    run_recv_loop(&state, &connection, ws_stream).await;

    // Either side closing tears the connection down
    send_task.abort();
    if let Err(e) = state.controller().disconnect(&connection).await {
        if e.is_fatal() {
            fail_fast(&e);
        }
        tracing::error!(
            socket_id = %connection.socket_id(),
            error = %e,
            "Disconnect handling failed"
        );
    }
}

/// Drain queued events into the WebSocket
async fn run_send_loop(
    mut ws_sink: futures_util::stream::SplitSink<axum::extract::ws::WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerEvent>,
) {
    while let Some(event) = rx.recv().await {
        match event.to_json() {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode outgoing event"),
        }
    }
    let _ = ws_sink.close().await;
}

/// Read client frames until the socket closes
async fn run_recv_loop(
    state: &GatewayState,
    connection: &Arc<Connection>,
    mut ws_stream: futures_util::stream::SplitStream<axum::extract::ws::WebSocket>,
) {
    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text_frame(state, connection, &text).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(
                    socket_id = %connection.socket_id(),
                    "Binary messages not supported"
                );
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::info!(socket_id = %connection.socket_id(), "Client closed connection");
                break;
            }
            Err(e) => {
                tracing::warn!(
                    socket_id = %connection.socket_id(),
                    error = %e,
                    "WebSocket error"
                );
                break;
            }
        }
    }
}

/// Parse and dispatch one client frame.
///
/// Malformed frames are logged and ignored rather than closing the socket:
/// one bad payload should not cost the client its session.
async fn handle_text_frame(state: &GatewayState, connection: &Arc<Connection>, text: &str) {
    let frame = match Frame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(
                socket_id = %connection.socket_id(),
                error = %e,
                "Ignoring malformed frame"
            );
            return;
        }
    };

    let event = match ClientEvent::from_frame(&frame) {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::debug!(
                socket_id = %connection.socket_id(),
                event = %frame.event,
                "Ignoring unknown event"
            );
            return;
        }
        Err(e) => {
            tracing::debug!(
                socket_id = %connection.socket_id(),
                event = %frame.event,
                error = %e,
                "Ignoring malformed event payload"
            );
            return;
        }
    };

    match event {
        ClientEvent::PrivateMessage { content, to } => {
            state
                .controller()
                .private_message(connection, content, to)
                .await;
        }
        ClientEvent::UpdatePosition { lat, lng } => {
            if let Err(e) = state.controller().update_position(connection, lat, lng).await {
                if e.is_fatal() {
                    fail_fast(&e);
                }
                tracing::error!(
                    socket_id = %connection.socket_id(),
                    error = %e,
                    "Position update failed"
                );
            }
        }
    }
}

/// Terminate the worker on a fatal error; the supervising pool replaces it.
fn fail_fast(error: &dyn std::error::Error) -> ! {
    tracing::error!(error = %error, "Fatal error, stopping worker");
    std::process::exit(1);
}
