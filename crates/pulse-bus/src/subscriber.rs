//! Bus subscriber.
//!
//! Owns a dedicated pub/sub connection on a background task, fans received
//! messages into a broadcast channel, and reconnects with a delay when the
//! transport drops.

use crate::channels::BusChannel;
use crate::envelope::Delivery;
use crate::error::{BusError, BusResult};
use futures_util::StreamExt;
use redis::Client;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Buffer size for the delivery broadcast channel
    pub broadcast_buffer: usize,
    /// Reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

/// Commands for subscription management
#[derive(Debug)]
enum SubscriberCommand {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Shutdown,
}

/// Background pub/sub listener
pub struct Subscriber {
    /// Currently subscribed channel names, restored after a reconnect
    subscribed: Arc<RwLock<HashSet<String>>>,
    /// Fan-in of received deliveries
    delivery_tx: broadcast::Sender<Delivery>,
    /// Control channel for subscription management
    control_tx: mpsc::Sender<SubscriberCommand>,
}

impl Subscriber {
    /// Create a subscriber with initial channels and start the background
    /// listener.
    pub fn spawn(config: SubscriberConfig, initial: &[BusChannel]) -> Self {
        let (delivery_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (control_tx, control_rx) = mpsc::channel(32);
        let subscribed: Arc<RwLock<HashSet<String>>> = Arc::new(RwLock::new(
            initial.iter().map(BusChannel::name).collect(),
        ));

        tokio::spawn(Self::listener_loop(
            config,
            subscribed.clone(),
            delivery_tx.clone(),
            control_rx,
        ));

        Self {
            subscribed,
            delivery_tx,
            control_tx,
        }
    }

    /// Background listener loop: run until shutdown, reconnecting on error.
    async fn listener_loop(
        config: SubscriberConfig,
        subscribed: Arc<RwLock<HashSet<String>>>,
        delivery_tx: broadcast::Sender<Delivery>,
        mut control_rx: mpsc::Receiver<SubscriberCommand>,
    ) {
        loop {
            match Self::run_listener(&config, &subscribed, &delivery_tx, &mut control_rx).await {
                Ok(true) => {
                    tracing::info!("Bus subscriber shutting down");
                    break;
                }
                Ok(false) => {
                    tracing::warn!("Bus subscriber stream ended, reconnecting...");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Bus subscriber error, reconnecting...");
                }
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(config.reconnect_delay_ms)).await;
        }
    }

    /// Run one connection until error or shutdown. Returns `true` on
    /// shutdown, `false` when the stream ended and a reconnect is due.
    async fn run_listener(
        config: &SubscriberConfig,
        subscribed: &Arc<RwLock<HashSet<String>>>,
        delivery_tx: &broadcast::Sender<Delivery>,
        control_rx: &mut mpsc::Receiver<SubscriberCommand>,
    ) -> BusResult<bool> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        {
            let channels = subscribed.read().await;
            for channel in channels.iter() {
                pubsub.subscribe(channel).await?;
            }
        }

        tracing::info!("Bus subscriber connected");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(msg) => {
                            let channel_name = msg.get_channel_name().to_string();
                            let payload: String = msg.get_payload().unwrap_or_default();

                            // Ignore send errors - no receivers right now
                            let _ = delivery_tx.send(Delivery::from_raw(&channel_name, payload));

                            tracing::trace!(channel = %channel_name, "Received bus message");
                        }
                        None => return Ok(false),
                    }
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(SubscriberCommand::Subscribe(channels)) => {
                            // The message stream borrows the connection;
                            // drop it to issue SUBSCRIBE commands.
                            drop(stream);
                            for channel in &channels {
                                if let Err(e) = pubsub.subscribe(channel).await {
                                    tracing::error!(channel = %channel, error = %e, "Failed to subscribe");
                                } else {
                                    subscribed.write().await.insert(channel.clone());
                                    tracing::debug!(channel = %channel, "Subscribed to channel");
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Unsubscribe(channels)) => {
                            drop(stream);
                            for channel in &channels {
                                if let Err(e) = pubsub.unsubscribe(channel).await {
                                    tracing::error!(channel = %channel, error = %e, "Failed to unsubscribe");
                                } else {
                                    subscribed.write().await.remove(channel);
                                    tracing::debug!(channel = %channel, "Unsubscribed from channel");
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Shutdown) | None => return Ok(true),
                    }
                }
            }
        }
    }

    /// Subscribe to channels
    pub async fn subscribe(&self, channels: &[BusChannel]) -> BusResult<()> {
        let names: Vec<String> = channels.iter().map(BusChannel::name).collect();
        self.control_tx
            .send(SubscriberCommand::Subscribe(names))
            .await
            .map_err(|_| BusError::Closed)
    }

    /// Unsubscribe from channels
    pub async fn unsubscribe(&self, channels: &[BusChannel]) -> BusResult<()> {
        let names: Vec<String> = channels.iter().map(BusChannel::name).collect();
        self.control_tx
            .send(SubscriberCommand::Unsubscribe(names))
            .await
            .map_err(|_| BusError::Closed)
    }

    /// Get a receiver for bus deliveries
    #[must_use]
    pub fn deliveries(&self) -> broadcast::Receiver<Delivery> {
        self.delivery_tx.subscribe()
    }

    /// Get currently subscribed channel names
    pub async fn subscribed_channels(&self) -> Vec<String> {
        self.subscribed.read().await.iter().cloned().collect()
    }

    /// Shut down the background listener
    pub async fn shutdown(&self) -> BusResult<()> {
        self.control_tx
            .send(SubscriberCommand::Shutdown)
            .await
            .map_err(|_| BusError::Closed)
    }
}
