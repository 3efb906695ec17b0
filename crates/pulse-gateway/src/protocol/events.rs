//! Typed server and client events.
//!
//! Wire field names follow the established client contract: identifiers are
//! `sessionID`/`userID`, roster entries carry `latitude`/`longitude`, and
//! position updates arrive as `lat`/`lng`.

use super::frame::{Frame, ProtocolError};
use pulse_core::{MessageRecord, SessionId, SessionRecord, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payload of the `session` event, sent to a freshly authenticated
/// connection so the client can persist its identifier for resumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    #[serde(rename = "userID")]
    pub user_id: UserId,
}

/// One entry of the `users` roster snapshot, also the payload of
/// `user connected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    pub username: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub connected: bool,
    /// Conversation history with the receiving user; empty for presence
    /// announcements.
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

impl RosterEntry {
    /// Build a roster entry from a stored session, annotated with the
    /// receiving user's conversation history.
    #[must_use]
    pub fn from_session(
        session: &SessionRecord,
        history: &mut HashMap<UserId, Vec<MessageRecord>>,
    ) -> Self {
        Self {
            user_id: session.user_id.clone(),
            username: session.username.clone(),
            latitude: session.latitude,
            longitude: session.longitude,
            connected: session.connected,
            messages: history.remove(&session.user_id).unwrap_or_default(),
        }
    }

    /// Presence announcement for a connection that just authenticated.
    #[must_use]
    pub fn connected_announcement(
        user_id: UserId,
        username: impl Into<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            latitude,
            longitude,
            connected: true,
            messages: Vec::new(),
        }
    }
}

/// Payload of the `user updated` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserUpdatedPayload {
    #[serde(rename = "userID")]
    user_id: UserId,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Events the gateway sends to clients.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Identity echo after authentication
    Session(SessionPayload),
    /// Full roster snapshot with per-user conversation history
    Users(Vec<RosterEntry>),
    /// A user came online somewhere in the cluster
    UserConnected(RosterEntry),
    /// A user's position changed
    UserUpdated {
        user_id: UserId,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },
    /// A user's last socket closed, cluster-wide
    UserDisconnected(UserId),
    /// An incoming private message
    PrivateMessage(MessageRecord),
}

impl ServerEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Users(_) => "users",
            Self::UserConnected(_) => "user connected",
            Self::UserUpdated { .. } => "user updated",
            Self::UserDisconnected(_) => "user disconnected",
            Self::PrivateMessage(_) => "private message",
        }
    }

    /// Serialize into a wire frame
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        let data = match self {
            Self::Session(payload) => serde_json::to_value(payload)?,
            Self::Users(entries) => serde_json::to_value(entries)?,
            Self::UserConnected(entry) => serde_json::to_value(entry)?,
            Self::UserUpdated {
                user_id,
                latitude,
                longitude,
            } => serde_json::to_value(UserUpdatedPayload {
                user_id: user_id.clone(),
                latitude: *latitude,
                longitude: *longitude,
            })?,
            Self::UserDisconnected(user_id) => serde_json::to_value(user_id)?,
            Self::PrivateMessage(message) => serde_json::to_value(message)?,
        };
        Ok(Frame::new(self.name(), data))
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        self.to_frame()?.to_json()
    }

    /// Decode a wire frame back into a typed event.
    ///
    /// Used when re-delivering frames that arrived over the fan-out bus.
    /// Unknown event names yield `Ok(None)`.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>, ProtocolError> {
        let event = match frame.event.as_str() {
            "session" => Self::Session(serde_json::from_value(frame.data.clone())?),
            "users" => Self::Users(serde_json::from_value(frame.data.clone())?),
            "user connected" => Self::UserConnected(serde_json::from_value(frame.data.clone())?),
            "user updated" => {
                let payload: UserUpdatedPayload = serde_json::from_value(frame.data.clone())?;
                Self::UserUpdated {
                    user_id: payload.user_id,
                    latitude: payload.latitude,
                    longitude: payload.longitude,
                }
            }
            "user disconnected" => {
                Self::UserDisconnected(serde_json::from_value(frame.data.clone())?)
            }
            "private message" => Self::PrivateMessage(serde_json::from_value(frame.data.clone())?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Payload of an inbound `private message` frame.
#[derive(Debug, Clone, Deserialize)]
struct PrivateMessageIn {
    content: String,
    to: UserId,
}

/// Payload of an inbound `update position` frame.
#[derive(Debug, Clone, Deserialize)]
struct UpdatePositionIn {
    lat: Option<f64>,
    lng: Option<f64>,
}

/// Events clients send to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    PrivateMessage { content: String, to: UserId },
    UpdatePosition { lat: Option<f64>, lng: Option<f64> },
}

impl ClientEvent {
    /// Parse a frame into a client event.
    ///
    /// Unknown event names yield `Ok(None)`: clients may speak a newer
    /// protocol revision and unknown events are simply ignored.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>, ProtocolError> {
        match frame.event.as_str() {
            "private message" => {
                let payload: PrivateMessageIn = serde_json::from_value(frame.data.clone())?;
                Ok(Some(Self::PrivateMessage {
                    content: payload.content,
                    to: payload.to,
                }))
            }
            "update position" => {
                let payload: UpdatePositionIn = serde_json::from_value(frame.data.clone())?;
                Ok(Some(Self::UpdatePosition {
                    lat: payload.lat,
                    lng: payload.lng,
                }))
            }
            _ => Ok(None),
        }
    }
}
