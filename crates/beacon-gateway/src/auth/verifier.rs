//! Identity verifier
//!
//! Resolves the bearer credential presented at connection time through the
//! backend identity-resolution action. Runs before the WebSocket upgrade
//! completes: a connection that fails here is refused at the transport and
//! never exists in a joinable state.

use beacon_core::{
    ActionDispatcher, ActionError, ActionMetadata, Identity, RESOLVE_IDENTITY_ACTION,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Authentication failures; all of them are fatal to the handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,

    #[error("credential rejected: {0}")]
    Rejected(String),

    #[error("identity service unavailable")]
    BackendUnavailable(String),

    #[error("malformed identity from backend: {0}")]
    MalformedIdentity(String),
}

/// Verifies bearer credentials against the backend
pub struct IdentityVerifier {
    dispatcher: Arc<dyn ActionDispatcher>,
}

impl IdentityVerifier {
    #[must_use]
    pub fn new(dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Resolve a credential to an identity.
    pub async fn authenticate(&self, credential: &str) -> Result<Identity, AuthError> {
        if credential.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let resolved = self
            .dispatcher
            .invoke(
                RESOLVE_IDENTITY_ACTION,
                json!({ "credential": credential }),
                ActionMetadata::internal(uuid::Uuid::new_v4().to_string()),
            )
            .await
            .map_err(|e| match e {
                ActionError::Unavailable(detail) => AuthError::BackendUnavailable(detail),
                ActionError::Handler(message) => AuthError::Rejected(message),
                ActionError::UnknownAction(_) => {
                    AuthError::BackendUnavailable("identity action not mounted".to_string())
                }
            })?;

        let identity: Identity = serde_json::from_value(resolved)
            .map_err(|e| AuthError::MalformedIdentity(e.to_string()))?;

        if identity.id.as_str().is_empty() {
            return Err(AuthError::MalformedIdentity("empty identity id".to_string()));
        }

        // Audit trail: truncated label only, never the credential
        tracing::info!(
            identity = %identity.id.audit_label(),
            "Authenticated connection credential"
        );

        Ok(identity)
    }
}
