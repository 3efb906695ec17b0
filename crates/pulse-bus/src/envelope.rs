//! Published frames and received deliveries.

use crate::channels::BusChannel;
use pulse_core::WorkerId;
use serde::{Deserialize, Serialize};

/// Wrapper around every published room/broadcast event.
///
/// Carries the origin worker so a worker can drop its own echoes: local
/// delivery already happened in-process before the publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: WorkerId,
    pub event: serde_json::Value,
}

impl Envelope {
    #[must_use]
    pub fn new(origin: WorkerId, event: serde_json::Value) -> Self {
        Self { origin, event }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A message received from the bus transport.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Channel the message arrived on
    pub channel: BusChannel,
    /// Raw payload
    pub payload: String,
}

impl Delivery {
    /// Create from a raw transport message
    #[must_use]
    pub fn from_raw(channel_name: &str, payload: String) -> Self {
        Self {
            channel: BusChannel::parse(channel_name),
            payload,
        }
    }

    /// Parse the payload as an event envelope (room/broadcast channels).
    #[must_use]
    pub fn envelope(&self) -> Option<Envelope> {
        serde_json::from_str(&self.payload).ok()
    }
}
