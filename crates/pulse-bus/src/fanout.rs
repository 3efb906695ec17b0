//! Fan-out bus trait and the Redis-backed implementation.

use crate::channels::BusChannel;
use crate::envelope::{Delivery, Envelope};
use crate::error::BusResult;
use crate::membership::{self, MembershipQuery, MembershipReply, MembershipView};
use crate::publisher::Publisher;
use crate::subscriber::{Subscriber, SubscriberConfig};
use async_trait::async_trait;
use futures_util::StreamExt;
use pulse_core::{SocketId, UserId, WorkerId};
use pulse_store::RedisPool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Cross-process event fan-out.
///
/// Sits between the gateway's in-process registry and the other workers:
/// events published here reach every worker's sockets, and membership
/// queries see the whole cluster rather than one process.
#[async_trait]
pub trait FanOutBus: Send + Sync {
    /// This worker's identity, stamped on every published envelope
    fn worker_id(&self) -> WorkerId;

    /// Publish an event to one user's room on every worker
    async fn publish_to_user(&self, user_id: &UserId, event: serde_json::Value) -> BusResult<()>;

    /// Publish an event to every connected client on every worker
    async fn broadcast(&self, event: serde_json::Value) -> BusResult<()>;

    /// Union of the user's room members across all workers.
    ///
    /// Errors must propagate: an empty set means "nobody is connected",
    /// which triggers disconnect announcements, so a transport failure
    /// cannot masquerade as one.
    async fn query_members(&self, user_id: &UserId) -> BusResult<HashSet<SocketId>>;

    /// Start receiving events for a user's room
    async fn subscribe_user(&self, user_id: &UserId) -> BusResult<()>;

    /// Stop receiving events for a user's room
    async fn unsubscribe_user(&self, user_id: &UserId) -> BusResult<()>;

    /// Receiver for everything this worker is subscribed to
    fn deliveries(&self) -> broadcast::Receiver<Delivery>;
}

/// Configuration for the Redis fan-out bus
#[derive(Debug, Clone)]
pub struct RedisFanOutBusConfig {
    /// Redis connection URL, also used by the background subscriber
    pub redis_url: String,
    /// This worker's identity
    pub worker_id: WorkerId,
    /// Number of workers expected to answer a membership query
    pub expected_workers: u32,
    /// How long to wait for membership replies before settling for the
    /// replies received so far
    pub membership_timeout: Duration,
}

impl RedisFanOutBusConfig {
    #[must_use]
    pub fn new(redis_url: impl Into<String>, worker_id: WorkerId, expected_workers: u32) -> Self {
        Self {
            redis_url: redis_url.into(),
            worker_id,
            expected_workers,
            membership_timeout: Duration::from_millis(250),
        }
    }

    #[must_use]
    pub fn with_membership_timeout(mut self, timeout: Duration) -> Self {
        self.membership_timeout = timeout;
        self
    }
}

/// Redis pub/sub backed fan-out bus.
///
/// Publishing goes through the shared connection pool; receiving runs on a
/// dedicated pub/sub connection owned by the background [`Subscriber`].
pub struct RedisFanOutBus {
    config: RedisFanOutBusConfig,
    publisher: Publisher,
    subscriber: Subscriber,
}

impl RedisFanOutBus {
    /// Create the bus and start its background subscriber, initially
    /// listening on the broadcast and membership-query channels.
    pub fn new(pool: RedisPool, config: RedisFanOutBusConfig) -> Self {
        let subscriber_config = SubscriberConfig {
            redis_url: config.redis_url.clone(),
            ..SubscriberConfig::default()
        };
        let subscriber = Subscriber::spawn(
            subscriber_config,
            &[BusChannel::Broadcast, BusChannel::MembersQuery],
        );

        Self {
            config,
            publisher: Publisher::new(pool),
            subscriber,
        }
    }

    /// Start answering membership queries with this worker's local view.
    pub fn start_responder(&self, view: Arc<dyn MembershipView>) -> tokio::task::JoinHandle<()> {
        membership::spawn_responder(
            self.config.worker_id,
            view,
            self.publisher.clone(),
            self.subscriber.deliveries(),
        )
    }

    /// Shut down the background subscriber
    pub async fn shutdown(&self) -> BusResult<()> {
        self.subscriber.shutdown().await
    }

    async fn publish_envelope(
        &self,
        channel: &BusChannel,
        event: serde_json::Value,
    ) -> BusResult<()> {
        let envelope = Envelope::new(self.config.worker_id, event);
        self.publisher.publish(channel, &envelope).await?;
        Ok(())
    }

    /// Scatter-gather on a dedicated pub/sub connection.
    ///
    /// The reply channel must be subscribed before the query is published,
    /// otherwise a fast worker's reply can be lost. A short-lived dedicated
    /// connection makes that ordering explicit.
    async fn gather_members(&self, query: &MembershipQuery) -> BusResult<HashSet<SocketId>> {
        let client = redis::Client::open(self.config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(query.reply_channel().name()).await?;

        self.publisher
            .publish_json(&BusChannel::MembersQuery, query)
            .await?;

        let mut members = HashSet::new();
        let mut answered: HashSet<WorkerId> = HashSet::new();
        let deadline = tokio::time::Instant::now() + self.config.membership_timeout;
        let mut stream = pubsub.on_message();

        while answered.len() < self.config.expected_workers as usize {
            let msg = tokio::select! {
                msg = stream.next() => msg,
                () = tokio::time::sleep_until(deadline) => {
                    tracing::debug!(
                        request_id = %query.request_id,
                        answered = answered.len(),
                        expected = self.config.expected_workers,
                        "Membership query timed out, using replies so far"
                    );
                    break;
                }
            };

            let Some(msg) = msg else { break };
            let payload: String = msg.get_payload().unwrap_or_default();
            match serde_json::from_str::<MembershipReply>(&payload) {
                Ok(reply) => {
                    members.extend(reply.sockets);
                    answered.insert(reply.worker);
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %query.request_id,
                        error = %e,
                        "Ignoring malformed membership reply"
                    );
                }
            }
        }

        Ok(members)
    }
}

#[async_trait]
impl FanOutBus for RedisFanOutBus {
    fn worker_id(&self) -> WorkerId {
        self.config.worker_id
    }

    async fn publish_to_user(&self, user_id: &UserId, event: serde_json::Value) -> BusResult<()> {
        self.publish_envelope(&BusChannel::user(user_id.clone()), event)
            .await
    }

    async fn broadcast(&self, event: serde_json::Value) -> BusResult<()> {
        self.publish_envelope(&BusChannel::Broadcast, event).await
    }

    async fn query_members(&self, user_id: &UserId) -> BusResult<HashSet<SocketId>> {
        let query = MembershipQuery::new(user_id.clone());
        let members = self.gather_members(&query).await?;
        tracing::debug!(
            user_id = %user_id,
            members = members.len(),
            "Resolved cluster-wide room membership"
        );
        Ok(members)
    }

    async fn subscribe_user(&self, user_id: &UserId) -> BusResult<()> {
        self.subscriber
            .subscribe(&[BusChannel::user(user_id.clone())])
            .await
    }

    async fn unsubscribe_user(&self, user_id: &UserId) -> BusResult<()> {
        self.subscriber
            .unsubscribe(&[BusChannel::user(user_id.clone())])
            .await
    }

    fn deliveries(&self) -> broadcast::Receiver<Delivery> {
        self.subscriber.deliveries()
    }
}
