//! Identity entity - the authenticated principal behind a connection.

use crate::value_objects::IdentityId;
use serde::{Deserialize, Serialize};

/// An identity resolved from a bearer credential by the backend.
///
/// Immutable for the lifetime of a connection; re-resolved on every new
/// connection and never cached beyond it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable identity id.
    pub id: IdentityId,

    /// Human-readable display name.
    pub display_name: String,

    /// Avatar URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: IdentityId::new(id),
            display_name: display_name.into(),
            avatar: None,
        }
    }

    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}
