//! Generic action relay
//!
//! Takes an arbitrary client-named action and forwards it into the backend
//! action layer under a denylist and error-containment policy. Every
//! per-request failure ends here as a reply envelope; a handler error never
//! terminates the connection and a raw error never crosses the transport.

use crate::connection::Connection;
use crate::protocol::{ActionFrame, ReplyEnvelope};
use beacon_core::{ActionDispatcher, ActionMetadata};
use std::sync::Arc;

/// Reply sent for denylisted actions
const NOT_ALLOWED: &str = "not allowed";

/// Relay boundary between the transport and the backend
pub struct ActionRelay {
    dispatcher: Arc<dyn ActionDispatcher>,
    denylist: super::Denylist,
}

impl ActionRelay {
    #[must_use]
    pub fn new(dispatcher: Arc<dyn ActionDispatcher>, denylist: super::Denylist) -> Self {
        Self { dispatcher, denylist }
    }

    /// Relay one inbound action frame on behalf of a connection.
    ///
    /// Always produces an envelope; the caller decides whether to write it
    /// back based on the frame's `ackId`.
    pub async fn relay(&self, connection: &Connection, frame: &ActionFrame) -> ReplyEnvelope {
        tracing::debug!(
            connection_id = %connection.id(),
            action = %frame.action_name,
            "<= action"
        );

        if self.denylist.is_denied(&frame.action_name) {
            tracing::warn!(
                connection_id = %connection.id(),
                action = %frame.action_name,
                "=> denied"
            );
            return ReplyEnvelope::failure(NOT_ALLOWED);
        }

        if !connection.is_active().await {
            return ReplyEnvelope::failure("connection not active");
        }

        let metadata = ActionMetadata {
            identity_id: Some(connection.identity_id().clone()),
            correlation_id: connection.correlation_id().to_string(),
            connection_id: Some(connection.id().clone()),
        };

        match self
            .dispatcher
            .invoke(&frame.action_name, frame.payload.clone(), metadata)
            .await
        {
            Ok(data) => {
                tracing::debug!(
                    connection_id = %connection.id(),
                    action = %frame.action_name,
                    "=> ok"
                );
                ReplyEnvelope::success(data)
            }
            Err(e) => {
                let message = e.client_message();
                tracing::debug!(
                    connection_id = %connection.id(),
                    action = %frame.action_name,
                    error = %e,
                    "=> failed"
                );
                ReplyEnvelope::failure(message)
            }
        }
    }
}
