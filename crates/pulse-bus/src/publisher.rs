//! Bus publisher.
//!
//! Publishes frames to transport channels for distribution to every worker
//! process.

use crate::channels::BusChannel;
use crate::envelope::Envelope;
use crate::error::BusResult;
use pulse_store::RedisPool;
use redis::AsyncCommands;

/// Redis pub/sub publisher
#[derive(Clone)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish an origin-tagged event envelope to a channel
    pub async fn publish(&self, channel: &BusChannel, envelope: &Envelope) -> BusResult<u32> {
        let payload = envelope.to_json()?;
        self.publish_raw(channel, &payload).await
    }

    /// Publish any serializable payload to a channel
    pub async fn publish_json<T: serde::Serialize>(
        &self,
        channel: &BusChannel,
        payload: &T,
    ) -> BusResult<u32> {
        let payload = serde_json::to_string(payload)?;
        self.publish_raw(channel, &payload).await
    }

    /// Publish a raw message to a channel
    pub async fn publish_raw(&self, channel: &BusChannel, message: &str) -> BusResult<u32> {
        let mut conn = self.pool.get().await.map_err(|e| match e {
            pulse_store::RedisPoolError::GetConnection(e) => e.into(),
            other => crate::BusError::Transport(other.to_string()),
        })?;
        let channel_name = channel.name();

        let receivers: u32 = conn.publish(&channel_name, message).await?;

        tracing::trace!(
            channel = %channel_name,
            receivers = receivers,
            "Published bus message"
        );

        Ok(receivers)
    }
}
