//! Per-worker room registry.
//!
//! Tracks this process's live sockets, grouped into rooms by user id: all
//! sockets sharing a user identity (multiple tabs, devices) belong to one
//! room. Cluster-wide membership is this view unioned with the other
//! workers' via the bus.

use super::Connection;
use crate::protocol::ServerEvent;
use dashmap::DashMap;
use pulse_bus::MembershipView;
use pulse_core::{SocketId, UserId};
use std::collections::HashSet;
use std::sync::Arc;

/// Thread-safe registry of the worker's live connections.
#[derive(Default)]
pub struct RoomRegistry {
    /// All live sockets
    sockets: DashMap<SocketId, Arc<Connection>>,
    /// User room membership, local sockets only
    rooms: DashMap<UserId, HashSet<SocketId>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connection and join it to its user's room
    pub fn join(&self, connection: Arc<Connection>) {
        let socket_id = connection.socket_id();
        let user_id = connection.user_id().clone();

        self.sockets.insert(socket_id, connection);
        self.rooms.entry(user_id.clone()).or_default().insert(socket_id);

        tracing::debug!(socket_id = %socket_id, user_id = %user_id, "Socket joined room");
    }

    /// Remove a connection, clearing its room entry when it was the last
    /// local socket for that user.
    pub fn leave(&self, socket_id: SocketId) -> Option<Arc<Connection>> {
        let (_, connection) = self.sockets.remove(&socket_id)?;
        let user_id = connection.user_id().clone();

        self.rooms.alter(&user_id, |_, mut members| {
            members.remove(&socket_id);
            members
        });
        self.rooms.retain(|_, members| !members.is_empty());

        tracing::debug!(socket_id = %socket_id, user_id = %user_id, "Socket left room");
        Some(connection)
    }

    #[must_use]
    pub fn get(&self, socket_id: SocketId) -> Option<Arc<Connection>> {
        self.sockets.get(&socket_id).map(|r| r.clone())
    }

    /// Number of live sockets on this worker
    #[must_use]
    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// Deliver an event to every local socket in a user's room, minus an
    /// optional excluded socket.
    pub fn send_to_user(&self, user_id: &UserId, event: &ServerEvent, exclude: Option<SocketId>) {
        let Some(members) = self.rooms.get(user_id) else {
            return;
        };
        for socket_id in members.iter() {
            if Some(*socket_id) == exclude {
                continue;
            }
            if let Some(connection) = self.sockets.get(socket_id) {
                connection.send(event.clone());
            }
        }
    }

    /// Deliver an event to every local socket, minus an optional excluded
    /// socket.
    pub fn broadcast(&self, event: &ServerEvent, exclude: Option<SocketId>) {
        for entry in &self.sockets {
            if Some(*entry.key()) == exclude {
                continue;
            }
            entry.value().send(event.clone());
        }
    }
}

impl MembershipView for RoomRegistry {
    fn local_members(&self, user_id: &UserId) -> Vec<SocketId> {
        self.rooms
            .get(user_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}
