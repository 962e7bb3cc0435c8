//! WebSocket handler
//!
//! Authenticates the handshake credential before completing the upgrade,
//! then runs the per-connection task trio: a reader (frames processed in
//! arrival order), a writer (bounded outbound queue), and a keepalive that
//! refreshes presence and the ownership registry.

use crate::auth::AuthError;
use crate::connection::{Connection, ConnectionState};
use crate::protocol::{ActionFrame, CloseCode, OutboundFrame};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use beacon_core::{ConnectionId, Identity, RoomKey};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

/// Handshake query parameters
#[derive(Debug, Deserialize)]
pub struct HandshakeQuery {
    /// Bearer credential supplied out-of-band at connection setup
    token: Option<String>,
}

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(credential) = extract_credential(&query, &headers) else {
        return (StatusCode::UNAUTHORIZED, "missing credential").into_response();
    };

    // Authenticate before the upgrade completes: a rejected credential is a
    // transport-level refusal, never a half-open connection.
    match state.verifier().authenticate(&credential).await {
        Ok(identity) => ws
            .on_upgrade(move |socket| handle_socket(state, socket, identity))
            .into_response(),
        Err(AuthError::BackendUnavailable(detail)) => {
            tracing::error!(error = %detail, "Identity backend unreachable during handshake");
            (StatusCode::SERVICE_UNAVAILABLE, "authentication unavailable").into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Handshake rejected");
            (StatusCode::UNAUTHORIZED, "invalid credential").into_response()
        }
    }
}

/// Credential from the query string or an Authorization bearer header
fn extract_credential(query: &HandshakeQuery, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = &query.token {
        if !token.is_empty() {
            return Some(token.clone());
        }
    }

    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(ToString::to_string)
}

/// Handle an upgraded, authenticated WebSocket connection
async fn handle_socket(state: GatewayState, socket: WebSocket, identity: Identity) {
    let connection_id = ConnectionId::generate();
    let (tx, mut rx) = mpsc::channel::<OutboundFrame>(state.config().gateway.send_buffer);

    let connection = Connection::new(connection_id.clone(), identity, tx);
    state.connections().insert(connection.clone());

    tracing::info!(
        connection_id = %connection_id,
        identity = %connection.identity_id().audit_label(),
        "Connection established"
    );

    // Setup: private-room auto-join, ownership announcement, presence.
    // Presence trouble degrades accuracy, it does not refuse the connection.
    let private_room = RoomKey::identity(connection.identity_id());
    state.membership().join(&connection_id, private_room).await;
    state.fanout().announce_connection(&connection_id).await;
    if let Err(e) = state
        .presence()
        .mark_online(
            connection.identity_id(),
            &connection_id,
            state.fanout().process_id(),
        )
        .await
    {
        tracing::warn!(connection_id = %connection_id, error = %e, "Presence registration failed");
    }

    connection.transition(ConnectionState::Active).await;

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Reader: frames from one connection are processed in arrival order;
    // backend suspension only suspends this connection's loop.
    let state_recv = state.clone();
    let connection_recv = connection.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(close_code) =
                        handle_text_frame(&state_recv, &connection_recv, &text).await
                    {
                        return Some(close_code);
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(
                        connection_id = %connection_recv.id(),
                        "Binary frames not supported"
                    );
                    return Some(CloseCode::DecodeError);
                }
                Ok(Message::Ping(_)) => {
                    // Pong is sent automatically; treat as a heartbeat
                    refresh_liveness(&state_recv, &connection_recv).await;
                }
                Ok(Message::Pong(_)) => {
                    tracing::trace!(connection_id = %connection_recv.id(), "Pong received");
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(
                        connection_id = %connection_recv.id(),
                        "Client closed connection"
                    );
                    return None;
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection_recv.id(),
                        error = %e,
                        "WebSocket error"
                    );
                    return Some(CloseCode::UnknownError);
                }
            }
        }
        None
    });

    // Writer: drains the bounded outbound queue; replies racing a
    // disconnect land in a closed channel and are dropped.
    let connection_id_send = connection_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame.to_json() {
                Ok(json) => {
                    if ws_sink.send(Message::Text(json.into())).await.is_err() {
                        tracing::debug!(
                            connection_id = %connection_id_send,
                            "Writer failed, closing"
                        );
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        connection_id = %connection_id_send,
                        error = %e,
                        "Failed to serialize outbound frame"
                    );
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    // Keepalive: refresh TTL-backed records well inside their window
    let state_ka = state.clone();
    let connection_ka = connection.clone();
    let refresh_secs = (state.config().presence.ttl_seconds / 4).max(1);
    let keepalive_task = tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(refresh_secs));
        tick.tick().await; // first tick fires immediately; skip it
        loop {
            tick.tick().await;
            refresh_liveness(&state_ka, &connection_ka).await;
        }
    });

    tokio::select! {
        result = recv_task => {
            if let Ok(Some(close_code)) = result {
                tracing::debug!(
                    connection_id = %connection_id,
                    close_code = %close_code,
                    "Reader ended with close code"
                );
            }
        }
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Writer ended");
        }
    }
    keepalive_task.abort();

    teardown(&state, &connection).await;
}

/// Handle one inbound text frame; a returned close code ends the connection.
async fn handle_text_frame(
    state: &GatewayState,
    connection: &Arc<Connection>,
    text: &str,
) -> Option<CloseCode> {
    let frame = match ActionFrame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(
                connection_id = %connection.id(),
                error = %e,
                "Failed to parse inbound frame"
            );
            return Some(CloseCode::DecodeError);
        }
    };

    let wants_reply = frame.wants_reply();
    let envelope = state.relay().relay(connection, &frame).await;

    // Fire-and-forget actions drop their reply silently
    if wants_reply {
        let reply = envelope.into_frame(frame.ack_id.unwrap_or_default());
        if connection.send(OutboundFrame::Reply(reply)).await.is_err() {
            tracing::debug!(
                connection_id = %connection.id(),
                "Reply dropped: connection closing"
            );
        }
    }

    None
}

/// Refresh presence and ownership TTLs for a live connection
async fn refresh_liveness(state: &GatewayState, connection: &Arc<Connection>) {
    if let Err(e) = state.presence().refresh(connection.identity_id()).await {
        tracing::warn!(
            connection_id = %connection.id(),
            error = %e,
            "Presence refresh failed"
        );
    }
    state.fanout().refresh_connection(connection.id()).await;
}

/// Disconnect teardown: presence removal, membership removal, registry
/// retirement, table removal. Each step logs and continues on error so no
/// room or presence record outlives the connection indefinitely.
async fn teardown(state: &GatewayState, connection: &Arc<Connection>) {
    let connection_id = connection.id().clone();
    tracing::info!(connection_id = %connection_id, "Tearing down connection");

    connection.transition(ConnectionState::Disconnecting).await;

    if let Err(e) = state
        .presence()
        .mark_offline(connection.identity_id(), &connection_id)
        .await
    {
        tracing::warn!(
            connection_id = %connection_id,
            error = %e,
            "Presence removal failed; record will expire by TTL"
        );
    }

    state.membership().remove_all(connection).await;
    state.fanout().retire_connection(&connection_id).await;
    state.connections().remove(&connection_id).await;

    connection.transition(ConnectionState::Closed).await;
}
