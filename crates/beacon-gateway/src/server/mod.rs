//! Gateway server setup
//!
//! Router construction and dependency wiring. The fan-out variant and the
//! presence store are chosen here once, from configuration, and injected
//! into everything else.

mod handler;
mod state;

pub use handler::gateway_handler;
pub use state::GatewayState;

use crate::auth::IdentityVerifier;
use crate::connection::ConnectionManager;
use crate::dispatch::MulticastDispatcher;
use crate::fanout::{ClusterFanout, ClusterFanoutConfig, FanoutAdapter, LocalFanout};
use crate::relay::{ActionRelay, Denylist};
use crate::rooms::RoomMembership;
use axum::{extract::State, routing::get, Json, Router};
use beacon_cache::{MemoryPresence, RedisPresence, RedisPool};
use beacon_common::{AppConfig, AppError, FanoutMode};
use beacon_core::{ActionDispatcher, PresenceTracker};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
}

/// Health report
#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    connections: usize,
    degraded: bool,
}

/// Health check endpoint
async fn health_check(State(state): State<GatewayState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        connections: state.connections().connection_count(),
        degraded: state.fanout().is_degraded(),
    })
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies and create `GatewayState`
pub async fn create_gateway_state(
    config: AppConfig,
    dispatcher: Arc<dyn ActionDispatcher>,
) -> Result<GatewayState, AppError> {
    let connections = ConnectionManager::new_shared();

    let (fanout, presence): (Arc<dyn FanoutAdapter>, Arc<dyn PresenceTracker>) =
        match config.fanout {
            FanoutMode::Local => {
                tracing::info!("Fan-out mode: local (single process)");
                (
                    Arc::new(LocalFanout::new(
                        connections.clone(),
                        config.process_id.clone(),
                    )),
                    Arc::new(MemoryPresence::new(config.presence.ttl_seconds)),
                )
            }
            FanoutMode::Clustered => {
                let redis = config
                    .redis
                    .as_ref()
                    .ok_or_else(|| AppError::Config("clustered fan-out requires REDIS_URL".into()))?;

                tracing::info!("Fan-out mode: clustered (Redis backbone)");
                let pool =
                    RedisPool::from_config(redis).map_err(|e| AppError::Cache(e.to_string()))?;

                let cluster = ClusterFanout::new(
                    ClusterFanoutConfig {
                        redis_url: redis.url.clone(),
                        broadcast_buffer: 1024,
                        reconnect_delay_ms: 1000,
                        connection_ttl_seconds: config.presence.ttl_seconds,
                    },
                    pool.clone(),
                    connections.clone(),
                    config.process_id.clone(),
                )
                .await
                .map_err(|e| AppError::Cache(e.to_string()))?;

                let cluster = Arc::new(cluster);
                cluster.clone().start();

                (
                    cluster,
                    Arc::new(RedisPresence::new(pool, config.presence.ttl_seconds)),
                )
            }
        };

    let membership = Arc::new(RoomMembership::new(connections.clone(), fanout.clone()));
    let multicast = Arc::new(MulticastDispatcher::new(fanout.clone()));
    let verifier = Arc::new(IdentityVerifier::new(dispatcher.clone()));

    let denylist = Denylist::new(&config.relay.denylist)
        .map_err(|e| AppError::Config(format!("invalid denylist pattern: {e}")))?;
    tracing::info!(patterns = ?denylist.patterns(), "Action denylist compiled");
    let relay = Arc::new(ActionRelay::new(dispatcher, denylist));

    Ok(GatewayState::new(
        config,
        connections,
        membership,
        multicast,
        verifier,
        relay,
        presence,
        fanout,
    ))
}

/// Run the gateway server
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!("Starting gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Transport(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Transport(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig, dispatcher: Arc<dyn ActionDispatcher>) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid gateway address: {e}")))?;

    let state = create_gateway_state(config, dispatcher).await?;
    let app = create_app(state);

    run_server(app, addr).await
}
