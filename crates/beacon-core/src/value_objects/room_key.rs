//! Room key - validated identifier of a logical delivery group.
//!
//! A room has no storage of its own; the key is the room. Two well-known
//! families exist: identity-private rooms (`identity:{id}`, auto-joined on
//! authentication) and arbitrary rooms joined explicitly through backend
//! actions.

use crate::value_objects::IdentityId;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Maximum accepted key length in bytes.
const MAX_LEN: usize = 128;

/// Prefix of identity-private room keys.
pub const IDENTITY_ROOM_PREFIX: &str = "identity:";

/// Validated room key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    /// Validate and wrap a raw key.
    pub fn new(key: impl Into<String>) -> Result<Self, RoomKeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(RoomKeyError::Empty);
        }
        if key.len() > MAX_LEN {
            return Err(RoomKeyError::TooLong { max: MAX_LEN });
        }
        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(RoomKeyError::InvalidCharacter);
        }
        Ok(Self(key))
    }

    /// The identity-private room for an identity.
    #[must_use]
    pub fn identity(id: &IdentityId) -> Self {
        // Identity ids are opaque but never contain whitespace by the time
        // they reach us; construction cannot fail for this family.
        Self(format!("{IDENTITY_ROOM_PREFIX}{id}"))
    }

    /// Whether this is an identity-private room key.
    #[must_use]
    pub fn is_identity_room(&self) -> bool {
        self.0.starts_with(IDENTITY_ROOM_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RoomKey {
    type Err = RoomKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for RoomKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Validation errors for room keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomKeyError {
    #[error("room key must not be empty")]
    Empty,

    #[error("room key exceeds {max} bytes")]
    TooLong { max: usize },

    #[error("room key contains whitespace or control characters")]
    InvalidCharacter,
}
