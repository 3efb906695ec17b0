//! Event dispatcher.
//!
//! Consumes bus deliveries and relays them to this worker's sockets.
//! Envelopes stamped with our own worker id are dropped: local delivery
//! already happened in-process before the publish.

use crate::connection::RoomRegistry;
use crate::protocol::{Frame, ServerEvent};
use pulse_bus::{BusChannel, Delivery, FanOutBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Routes bus deliveries to local WebSocket connections.
pub struct EventDispatcher {
    registry: Arc<RoomRegistry>,
    bus: Arc<dyn FanOutBus>,
    running: AtomicBool,
}

impl EventDispatcher {
    pub fn new(registry: Arc<RoomRegistry>, bus: Arc<dyn FanOutBus>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            bus,
            running: AtomicBool::new(false),
        })
    }

    /// Start consuming bus deliveries on a background task.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Event dispatcher already running");
        }

        let dispatcher = self.clone();
        let mut deliveries = self.bus.deliveries();
        tokio::spawn(async move {
            loop {
                match deliveries.recv().await {
                    Ok(delivery) => dispatcher.dispatch(&delivery),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Dispatcher lagged behind bus deliveries");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Bus delivery channel closed, dispatcher stopping");
                        break;
                    }
                }
            }
            dispatcher.running.store(false, Ordering::SeqCst);
        })
    }

    /// Relay one delivery to the sockets it concerns.
    fn dispatch(&self, delivery: &Delivery) {
        let target_user = match &delivery.channel {
            BusChannel::User(user_id) => Some(user_id.clone()),
            BusChannel::Broadcast => None,
            // Membership traffic is handled by the bus itself
            _ => return,
        };

        let Some(envelope) = delivery.envelope() else {
            tracing::warn!(channel = %delivery.channel, "Ignoring malformed envelope");
            return;
        };
        if envelope.origin == self.bus.worker_id() {
            return;
        }

        let frame: Frame = match serde_json::from_value(envelope.event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(channel = %delivery.channel, error = %e, "Ignoring malformed event frame");
                return;
            }
        };
        let event = match ServerEvent::from_frame(&frame) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!(event = %frame.event, "Ignoring unknown bus event");
                return;
            }
            Err(e) => {
                tracing::warn!(event = %frame.event, error = %e, "Ignoring undecodable bus event");
                return;
            }
        };

        match target_user {
            Some(user_id) => self.registry.send_to_user(&user_id, &event, None),
            None => self.registry.broadcast(&event, None),
        }

        tracing::trace!(
            event = event.name(),
            origin = %envelope.origin,
            "Dispatched bus event"
        );
    }
}
