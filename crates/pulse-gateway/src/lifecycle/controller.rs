//! Session lifecycle controller.
//!
//! One controller per worker, shared by every connection. Event delivery is
//! best-effort and decoupled from persistence: a failed store write is
//! logged and does not block the relay path, while fatal store errors
//! propagate so the worker can terminate.

use crate::connection::{Connection, RoomRegistry};
use crate::lifecycle::auth::{AuthError, Identity};
use crate::protocol::{Handshake, RosterEntry, ServerEvent, SessionPayload};
use pulse_bus::{FanOutBus, MembershipView};
use pulse_common::AppError;
use pulse_core::{
    group_by_counterpart, MessageRecord, MessageStore, SessionId, SessionPatch, SessionStore,
    SocketId, UserId,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffer size for each connection's outgoing event queue
const EVENT_BUFFER_SIZE: usize = 100;

/// Drives connections through their lifecycle states.
pub struct LifecycleController {
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    bus: Arc<dyn FanOutBus>,
    registry: Arc<RoomRegistry>,
}

impl LifecycleController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageStore>,
        bus: Arc<dyn FanOutBus>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            sessions,
            messages,
            bus,
            registry,
        }
    }

    /// Resolve a handshake to an identity.
    ///
    /// A known session identifier resumes its stored identity; an unknown
    /// one mints a fresh `user_id` with `username` equal to the session
    /// identifier. A missing identifier rejects the connection.
    pub async fn authenticate(&self, handshake: &Handshake) -> Result<Identity, AuthError> {
        let Some(raw_session_id) = handshake.session_id() else {
            return Err(AuthError::InvalidUsername);
        };
        let session_id = SessionId::new(raw_session_id);

        let identity = match self.sessions.find_session(&session_id).await? {
            Some(record) => Identity {
                session_id,
                user_id: record.user_id,
                username: record.username,
                latitude: handshake.latitude(),
                longitude: handshake.longitude(),
            },
            None => Identity {
                user_id: UserId::mint(),
                username: raw_session_id.to_string(),
                session_id,
                latitude: handshake.latitude(),
                longitude: handshake.longitude(),
            },
        };

        tracing::info!(
            session_id = %identity.session_id,
            user_id = %identity.user_id,
            "Connection authenticated"
        );
        Ok(identity)
    }

    /// Transition an authenticated connection to active.
    ///
    /// Persists the session, registers the socket in its user room, emits
    /// the identity echo and the roster snapshot, and announces the user
    /// cluster-wide.
    pub async fn connect(
        &self,
        identity: Identity,
    ) -> Result<(Arc<Connection>, mpsc::Receiver<ServerEvent>), AppError> {
        let patch = SessionPatch::connect(
            identity.user_id.clone(),
            identity.username.clone(),
            identity.latitude,
            identity.longitude,
        );
        self.save_session_checked(&identity.session_id, patch)
            .await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let connection = Arc::new(Connection::new(
            identity.session_id.clone(),
            identity.user_id.clone(),
            identity.username.clone(),
            (identity.latitude, identity.longitude),
            tx,
        ));

        connection.send(ServerEvent::Session(SessionPayload {
            session_id: identity.session_id.clone(),
            user_id: identity.user_id.clone(),
        }));

        self.registry.join(connection.clone());
        if let Err(e) = self.bus.subscribe_user(&identity.user_id).await {
            tracing::warn!(user_id = %identity.user_id, error = %e, "Failed to subscribe user room on bus");
        }

        // The socket is already visible to membership queries; a failed
        // roster fetch must take it back out or the user would count as
        // online forever.
        let roster = match self.roster(&identity.user_id).await {
            Ok(entries) => entries,
            Err(e) => {
                self.release(&connection).await;
                return Err(e);
            }
        };
        connection.send(ServerEvent::Users(roster));

        let announcement = ServerEvent::UserConnected(RosterEntry::connected_announcement(
            identity.user_id.clone(),
            identity.username,
            identity.latitude,
            identity.longitude,
        ));
        self.announce(&announcement, Some(connection.socket_id()))
            .await;

        Ok((connection, rx))
    }

    /// Relay a private message, then persist it.
    ///
    /// Reaches every socket of the recipient and every *other* socket of
    /// the sender, so the sender's own tabs see the sent message too.
    pub async fn private_message(&self, connection: &Connection, content: String, to: UserId) {
        let message = MessageRecord::new(connection.user_id().clone(), to.clone(), content);
        let event = ServerEvent::PrivateMessage(message.clone());
        let exclude = Some(connection.socket_id());

        self.registry.send_to_user(&to, &event, exclude);
        if to != *connection.user_id() {
            self.registry
                .send_to_user(connection.user_id(), &event, exclude);
        }

        if let Some(frame) = frame_value(&event) {
            if let Err(e) = self.bus.publish_to_user(&to, frame.clone()).await {
                tracing::warn!(to = %to, error = %e, "Cross-process message delivery failed");
            }
            if to != *connection.user_id() {
                if let Err(e) = self.bus.publish_to_user(connection.user_id(), frame).await {
                    tracing::warn!(error = %e, "Cross-process sender echo failed");
                }
            }
        }

        // Fire-and-forget persistence, decoupled from delivery
        if let Err(e) = self.messages.save_message(&message).await {
            tracing::warn!(
                from = %message.from,
                to = %message.to,
                error = %e,
                "Failed to persist message"
            );
        }
    }

    /// Apply a position update and announce it cluster-wide.
    pub async fn update_position(
        &self,
        connection: &Connection,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Result<(), AppError> {
        connection.set_position(lat, lng).await;

        self.save_session_checked(connection.session_id(), SessionPatch::position(lat, lng))
            .await?;

        let event = ServerEvent::UserUpdated {
            user_id: connection.user_id().clone(),
            latitude: lat,
            longitude: lng,
        };
        self.announce(&event, Some(connection.socket_id())).await;
        Ok(())
    }

    /// Handle a closed socket.
    ///
    /// The user is announced offline only when no socket for their id is
    /// left anywhere in the cluster. A failed membership query suppresses
    /// the announcement: better a stale "online" than a false "offline".
    pub async fn disconnect(&self, connection: &Connection) -> Result<(), AppError> {
        let user_id = connection.user_id().clone();
        self.release(connection).await;

        let remaining = match self.bus.query_members(&user_id).await {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Membership query failed, skipping disconnect announcement"
                );
                return Ok(());
            }
        };
        if !remaining.is_empty() {
            tracing::debug!(
                user_id = %user_id,
                remaining = remaining.len(),
                "User still connected elsewhere"
            );
            return Ok(());
        }

        self.save_session_checked(connection.session_id(), SessionPatch::disconnect())
            .await?;

        self.announce(&ServerEvent::UserDisconnected(user_id.clone()), None)
            .await;
        tracing::info!(user_id = %user_id, "User disconnected cluster-wide");
        Ok(())
    }

    /// Take a socket out of the registry, dropping the user's bus
    /// subscription when it was their last local socket.
    async fn release(&self, connection: &Connection) {
        let user_id = connection.user_id();
        self.registry.leave(connection.socket_id());

        if self.registry.local_members(user_id).is_empty() {
            if let Err(e) = self.bus.unsubscribe_user(user_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to unsubscribe user room on bus");
            }
        }
    }

    /// Roster snapshot: every stored session, annotated with the viewing
    /// user's conversation history.
    async fn roster(&self, viewer: &UserId) -> Result<Vec<RosterEntry>, AppError> {
        let (messages, sessions) = tokio::join!(
            self.messages.messages_for_user(viewer),
            self.sessions.find_all_sessions(),
        );
        let mut history = group_by_counterpart(viewer, messages?);
        let sessions = sessions?;

        Ok(sessions
            .iter()
            .map(|session| RosterEntry::from_session(session, &mut history))
            .collect())
    }

    /// Deliver an event to all local sockets and publish it for the other
    /// workers. Bus failures degrade to local-only delivery.
    async fn announce(&self, event: &ServerEvent, exclude: Option<SocketId>) {
        self.registry.broadcast(event, exclude);

        if let Some(frame) = frame_value(event) {
            if let Err(e) = self.bus.broadcast(frame).await {
                tracing::warn!(
                    event = event.name(),
                    error = %e,
                    "Cross-process broadcast failed, delivered locally only"
                );
            }
        }
    }

    /// Persist a session patch. Non-fatal failures are logged and
    /// swallowed; fatal ones propagate so the worker can terminate.
    async fn save_session_checked(
        &self,
        session_id: &SessionId,
        patch: SessionPatch,
    ) -> Result<(), AppError> {
        match self.sessions.save_session(session_id, patch).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(AppError::from(e)),
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Session save failed");
                Ok(())
            }
        }
    }
}

/// Encode an event as a wire-frame JSON value for bus transport.
fn frame_value(event: &ServerEvent) -> Option<serde_json::Value> {
    match event.to_frame().map(serde_json::to_value) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::error!(event = event.name(), error = %e, "Failed to encode event frame");
            None
        }
        Err(e) => {
            tracing::error!(event = event.name(), error = %e, "Failed to encode event frame");
            None
        }
    }
}
