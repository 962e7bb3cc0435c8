//! Test harness: in-process gateway plus a WebSocket client.

use anyhow::{Context, Result};
use beacon_common::{
    AppConfig, AppSettings, Environment, FanoutMode, GatewayConfig, PresenceConfig, RelayConfig,
};
use beacon_core::{ActionError, ProcessId, RESOLVE_IDENTITY_ACTION};
use beacon_gateway::actions::ActionRouter;
use beacon_gateway::admin::GatewayHandle;
use beacon_gateway::{create_app, create_gateway_state, GatewayState};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite::{self, Message};

/// WebSocket client stream type
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An in-process gateway listening on an ephemeral port
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: GatewayState,
    pub backend: Arc<ActionRouter>,
}

impl TestGateway {
    /// Boot a gateway with only the scripted identity resolver mounted.
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    /// Boot a gateway, letting the test mount extra backend handlers.
    ///
    /// The identity resolver accepts `valid-{id}` credentials and resolves
    /// them to an identity named after the id.
    pub async fn spawn_with(configure: impl FnOnce(&ActionRouter)) -> Result<Self> {
        let backend = Arc::new(ActionRouter::new());
        backend.register(RESOLVE_IDENTITY_ACTION, |payload: Value, _meta| async move {
            let credential = payload["credential"].as_str().unwrap_or_default();
            match credential.strip_prefix("valid-") {
                Some(id) if !id.is_empty() => Ok(json!({
                    "id": id,
                    "displayName": id,
                })),
                _ => Err(ActionError::Handler("invalid credential".to_string())),
            }
        });
        configure(&backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding ephemeral port")?;
        let addr = listener.local_addr()?;

        let config = AppConfig {
            app: AppSettings {
                name: "beacon-test".to_string(),
                env: Environment::Development,
            },
            gateway: GatewayConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
                send_buffer: 64,
            },
            fanout: FanoutMode::Local,
            redis: None,
            presence: PresenceConfig { ttl_seconds: 60 },
            relay: RelayConfig {
                denylist: vec!["gateway.*".to_string()],
            },
            process_id: ProcessId::generate(),
        };

        let state = create_gateway_state(config, backend.clone())
            .await
            .context("building gateway state")?;
        let app = create_app(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            backend,
        })
    }

    /// Backend-facing admin handle.
    #[must_use]
    pub fn handle(&self) -> GatewayHandle {
        self.state.handle()
    }

    /// Handshake URL for a credential.
    #[must_use]
    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/gateway?token={token}", self.addr)
    }

    /// Open an authenticated client connection.
    pub async fn connect(&self, token: &str) -> Result<WsClient, tungstenite::Error> {
        let (ws, _response) = connect_async(self.ws_url(token)).await?;
        Ok(ws)
    }
}

/// Send an action frame.
pub async fn send_action(
    ws: &mut WsClient,
    action: &str,
    payload: Value,
    ack_id: Option<Value>,
) -> Result<()> {
    let mut frame = json!({
        "actionName": action,
        "payload": payload,
    });
    if let Some(ack) = ack_id {
        frame["ackId"] = ack;
    }
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .context("sending action frame")
}

/// Round-trip an acked no-op action and wait for its reply.
///
/// The gateway's reader task only starts once connection setup (private
/// room join, presence registration) has finished, so a completed
/// round-trip is a barrier the tests can order admin operations against.
pub async fn sync(ws: &mut WsClient) -> Result<()> {
    send_action(ws, "sync.noop", json!({}), Some(json!("sync"))).await?;
    let reply = recv_json(ws).await?;
    anyhow::ensure!(reply["ackId"] == "sync", "unexpected frame during sync");
    Ok(())
}

/// Receive the next text frame as JSON, with a timeout.
pub async fn recv_json(ws: &mut WsClient) -> Result<Value> {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .context("timed out waiting for frame")?
        .context("connection closed")??;

    match msg {
        Message::Text(text) => serde_json::from_str(&text).context("parsing frame"),
        other => anyhow::bail!("unexpected frame: {other:?}"),
    }
}

/// Assert no frame arrives within the window.
pub async fn expect_silence(ws: &mut WsClient, window_ms: u64) -> bool {
    tokio::time::timeout(Duration::from_millis(window_ms), ws.next())
        .await
        .is_err()
}

/// Poll an async predicate until it holds or the timeout passes.
pub async fn eventually<F, Fut>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if predicate().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
