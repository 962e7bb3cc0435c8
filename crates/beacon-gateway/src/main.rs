//! Gateway server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p beacon-gateway
//! ```
//!
//! Configuration is loaded from environment variables. The standalone
//! binary starts with an empty action router; embedding backends mount
//! their services (including `user.resolveIdentity`) on it before calling
//! `beacon_gateway::run`.

use beacon_common::{try_init_tracing, AppConfig};
use beacon_gateway::actions::ActionRouter;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting beacon gateway...");

    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        port = config.gateway.port,
        fanout = ?config.fanout,
        process_id = %config.process_id,
        "Configuration loaded"
    );

    let router = Arc::new(ActionRouter::new());
    if router.is_empty() {
        warn!("No backend action handlers mounted; handshakes will fail until a backend registers user.resolveIdentity");
    }

    beacon_gateway::run(config, router).await?;

    Ok(())
}
