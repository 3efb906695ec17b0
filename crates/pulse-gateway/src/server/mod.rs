//! Gateway server setup
//!
//! Wires the stores, bus, registry, and lifecycle controller together and
//! serves the WebSocket endpoint.

mod handler;
mod state;

pub use handler::ws_handler;
pub use state::GatewayState;

use crate::broadcast::EventDispatcher;
use crate::connection::RoomRegistry;
use crate::lifecycle::LifecycleController;
use axum::{routing::get, Router};
use pulse_bus::{RedisFanOutBus, RedisFanOutBusConfig};
use pulse_common::{AppConfig, AppError};
use pulse_core::{MessageStore, SessionStore};
use pulse_store::{RedisMessageStore, RedisPool, RedisPoolConfig, RedisSessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies and create `GatewayState`
pub fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    tracing::info!("Connecting to Redis...");
    let pool_config = RedisPoolConfig::from(&config.redis);
    let pool = RedisPool::new(pool_config).map_err(|e| AppError::Store(e.into()))?;
    tracing::info!("Redis connection pool created");

    let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(pool.clone()));
    let messages: Arc<dyn MessageStore> = Arc::new(RedisMessageStore::new(pool.clone()));

    let bus_config = RedisFanOutBusConfig::new(
        config.redis.url.clone(),
        pulse_core::WorkerId::new(config.cluster.worker_id),
        config.cluster.workers_count,
    )
    .with_membership_timeout(Duration::from_millis(config.cluster.membership_timeout_ms));
    let bus = Arc::new(RedisFanOutBus::new(pool, bus_config));

    let registry = RoomRegistry::new_shared();

    // Answer membership queries with this worker's local view
    bus.start_responder(registry.clone());

    let controller = Arc::new(LifecycleController::new(
        sessions,
        messages,
        bus.clone(),
        registry.clone(),
    ));

    // Relay events published by other workers to our sockets
    let dispatcher = EventDispatcher::new(registry, bus);
    dispatcher.start();

    Ok(GatewayState::new(controller, config))
}

/// Run the gateway server
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!(%addr, "Starting gateway server");

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Server(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{addr}/ws");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Server(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .server
        .address()
        .parse()
        .map_err(|e| AppError::Server(format!("Invalid bind address: {e}")))?;

    let state = create_gateway_state(config)?;
    let app = create_app(state);
    run_server(app, addr).await
}
