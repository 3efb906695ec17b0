//! Worker harness and event assertions.

use crate::cluster::{LocalBus, LocalCluster};
use crate::memory::{MemoryMessageStore, MemorySessionStore};
use anyhow::{bail, Result};
use pulse_core::WorkerId;
use pulse_gateway::broadcast::EventDispatcher;
use pulse_gateway::connection::{Connection, RoomRegistry};
use pulse_gateway::lifecycle::LifecycleController;
use pulse_gateway::protocol::{Handshake, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One in-process worker: registry, controller, bus endpoint, dispatcher.
pub struct TestWorker {
    pub bus: Arc<LocalBus>,
    pub registry: Arc<RoomRegistry>,
    pub controller: Arc<LifecycleController>,
}

impl TestWorker {
    /// Spawn a worker on the cluster, sharing the given stores.
    pub fn spawn(
        cluster: &Arc<LocalCluster>,
        worker_id: u32,
        sessions: Arc<MemorySessionStore>,
        messages: Arc<MemoryMessageStore>,
    ) -> Self {
        let bus = cluster.join(WorkerId::new(worker_id));
        let registry = RoomRegistry::new_shared();
        bus.attach_view(registry.clone());

        let controller = Arc::new(LifecycleController::new(
            sessions,
            messages,
            bus.clone(),
            registry.clone(),
        ));

        let dispatcher = EventDispatcher::new(registry.clone(), bus.clone());
        dispatcher.start();

        Self {
            bus,
            registry,
            controller,
        }
    }

    /// Authenticate and connect a client, returning its connection and
    /// event stream.
    pub async fn connect(
        &self,
        username: &str,
        position: (Option<f64>, Option<f64>),
    ) -> Result<(Arc<Connection>, mpsc::Receiver<ServerEvent>)> {
        let identity = self
            .controller
            .authenticate(&handshake(Some(username), position.0, position.1))
            .await?;
        Ok(self.controller.connect(identity).await?)
    }
}

/// Build a handshake the way the upgrade request would carry it.
pub fn handshake(username: Option<&str>, lat: Option<f64>, lng: Option<f64>) -> Handshake {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    if let Some(username) = username {
        pairs.push(("username", username.to_string()));
    }
    if let Some(lat) = lat {
        pairs.push(("latitd", lat.to_string()));
    }
    if let Some(lng) = lng {
        pairs.push(("longitd", lng.to_string()));
    }
    let query = serde_urlencoded::to_string(&pairs).unwrap_or_default();
    serde_urlencoded::from_str(&query).unwrap_or_default()
}

/// Receive the next event or fail after a short timeout.
pub async fn expect_event(rx: &mut mpsc::Receiver<ServerEvent>) -> Result<ServerEvent> {
    match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => bail!("event channel closed"),
        Err(_) => bail!("timed out waiting for event"),
    }
}

/// Assert that no event arrives within the settle window.
pub async fn no_event(rx: &mut mpsc::Receiver<ServerEvent>) -> Result<()> {
    match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        Ok(Some(event)) => bail!("unexpected event: {}", event.name()),
        Ok(None) => Ok(()),
        Err(_) => Ok(()),
    }
}

/// Let spawned dispatcher tasks drain their queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
