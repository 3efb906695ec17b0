//! Pulse gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p pulse-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use pulse_common::{try_init_tracing, AppConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting pulse gateway...");

    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        worker = config.cluster.worker_id,
        port = config.server.port,
        "Configuration loaded"
    );

    pulse_gateway::run(config).await?;

    Ok(())
}
