//! Cluster-wide room membership queries.
//!
//! A worker only sees its own sockets, so "is this user still connected
//! anywhere" needs a scatter-gather round: publish a query on the shared
//! query channel, have every worker reply with its local member set on a
//! per-request reply channel, and union the replies.

use crate::channels::BusChannel;
use crate::envelope::Delivery;
use crate::error::BusResult;
use crate::publisher::Publisher;
use pulse_core::{SocketId, UserId, WorkerId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// A worker's local view of room membership.
///
/// Implemented by the gateway's connection registry; the bus uses it to
/// answer membership queries from other workers.
pub trait MembershipView: Send + Sync {
    /// Socket ids this worker currently holds for the user's room
    fn local_members(&self, user_id: &UserId) -> Vec<SocketId>;
}

/// Scatter-gather request, published on the shared query channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipQuery {
    /// Unique request id, doubles as the reply channel suffix
    pub request_id: String,
    /// User whose room is being queried
    pub user_id: UserId,
}

impl MembershipQuery {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id,
        }
    }

    /// Channel this query's replies arrive on
    #[must_use]
    pub fn reply_channel(&self) -> BusChannel {
        BusChannel::reply(self.request_id.clone())
    }
}

/// One worker's reply to a membership query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipReply {
    /// Worker that produced this reply
    pub worker: WorkerId,
    /// Its local sockets in the queried user's room, possibly empty
    pub sockets: Vec<SocketId>,
}

/// Background responder: answers membership queries with this worker's
/// local view. Every worker answers, including the one that asked -
/// its own sockets count toward the union like anyone else's.
pub fn spawn_responder(
    worker_id: WorkerId,
    view: Arc<dyn MembershipView>,
    publisher: Publisher,
    mut deliveries: broadcast::Receiver<Delivery>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delivery = match deliveries.recv().await {
                Ok(d) => d,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Membership responder lagged behind bus deliveries");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if delivery.channel != BusChannel::MembersQuery {
                continue;
            }

            let query: MembershipQuery = match serde_json::from_str(&delivery.payload) {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring malformed membership query");
                    continue;
                }
            };

            let reply = MembershipReply {
                worker: worker_id,
                sockets: view.local_members(&query.user_id),
            };

            if let Err(e) = answer(&publisher, &query, &reply).await {
                tracing::error!(
                    request_id = %query.request_id,
                    error = %e,
                    "Failed to publish membership reply"
                );
            }
        }
    })
}

async fn answer(
    publisher: &Publisher,
    query: &MembershipQuery,
    reply: &MembershipReply,
) -> BusResult<()> {
    publisher
        .publish_json(&query.reply_channel(), reply)
        .await?;
    tracing::trace!(
        request_id = %query.request_id,
        user_id = %query.user_id,
        sockets = reply.sockets.len(),
        "Answered membership query"
    );
    Ok(())
}
