//! Backend action dispatcher boundary.
//!
//! Everything behind the gateway - identity resolution, chat domain logic,
//! plugin services - is reached through this single trait. The gateway never
//! interprets action payloads; it injects caller metadata and forwards.

use crate::value_objects::{ConnectionId, IdentityId};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Well-known action name used to resolve a bearer credential.
pub const RESOLVE_IDENTITY_ACTION: &str = "user.resolveIdentity";

/// Metadata injected into every dispatched action on behalf of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMetadata {
    /// Authenticated identity of the caller, if any.
    pub identity_id: Option<IdentityId>,

    /// Correlation id unique to the calling connection.
    pub correlation_id: String,

    /// Connection the call originated from. Lets backend actions ask the
    /// gateway to operate on the caller's own socket (e.g. room joins).
    pub connection_id: Option<ConnectionId>,
}

impl ActionMetadata {
    /// Metadata for a call made by the gateway itself, outside any connection.
    #[must_use]
    pub fn internal(correlation_id: impl Into<String>) -> Self {
        Self {
            identity_id: None,
            correlation_id: correlation_id.into(),
            connection_id: None,
        }
    }
}

/// Errors crossing the dispatcher boundary.
///
/// `Handler` carries the handler's human-readable message and is the only
/// variant whose text may be shown to clients.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("{0}")]
    Handler(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl ActionError {
    /// The message suitable for a client-facing reply envelope.
    ///
    /// Handler failures pass their own text through; infrastructure failures
    /// collapse to a generic message so internals never leak to clients.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Handler(message) => message.clone(),
            Self::UnknownAction(name) => format!("unknown action: {name}"),
            Self::Unavailable(_) => "service unavailable".to_string(),
        }
    }
}

/// Result type for dispatcher operations.
pub type ActionResult<T> = Result<T, ActionError>;

/// The opaque backend action layer.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Invoke a named action with a payload and caller metadata.
    async fn invoke(
        &self,
        action: &str,
        payload: Value,
        metadata: ActionMetadata,
    ) -> ActionResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_infrastructure() {
        let err = ActionError::Unavailable("redis timed out at 10.0.0.3".to_string());
        assert_eq!(err.client_message(), "service unavailable");
    }

    #[test]
    fn test_client_message_passes_handler_text() {
        let err = ActionError::Handler("group not found".to_string());
        assert_eq!(err.client_message(), "group not found");
    }
}
