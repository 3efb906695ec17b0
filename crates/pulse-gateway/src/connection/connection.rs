//! Per-socket connection state.

use crate::protocol::ServerEvent;
use pulse_core::{SessionId, SocketId, UserId};
use tokio::sync::{mpsc, RwLock};

/// One authenticated WebSocket connection.
///
/// The identity fields are fixed at authentication; only the position
/// changes afterwards. Outgoing events go through the mpsc sender, drained
/// by the socket's dedicated send task.
pub struct Connection {
    socket_id: SocketId,
    session_id: SessionId,
    user_id: UserId,
    username: String,
    position: RwLock<(Option<f64>, Option<f64>)>,
    sender: mpsc::Sender<ServerEvent>,
}

impl Connection {
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        username: impl Into<String>,
        position: (Option<f64>, Option<f64>),
        sender: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            socket_id: SocketId::generate(),
            session_id,
            user_id,
            username: username.into(),
            position: RwLock::new(position),
            sender,
        }
    }

    #[must_use]
    pub fn socket_id(&self) -> SocketId {
        self.socket_id
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn position(&self) -> (Option<f64>, Option<f64>) {
        *self.position.read().await
    }

    pub async fn set_position(&self, latitude: Option<f64>, longitude: Option<f64>) {
        *self.position.write().await = (latitude, longitude);
    }

    /// Queue an event for delivery to this socket.
    ///
    /// Best-effort: a full or closed channel means the socket is going
    /// away and the event is dropped.
    pub fn send(&self, event: ServerEvent) {
        if let Err(e) = self.sender.try_send(event) {
            tracing::debug!(
                socket_id = %self.socket_id,
                error = %e,
                "Dropping event for unreachable socket"
            );
        }
    }
}
