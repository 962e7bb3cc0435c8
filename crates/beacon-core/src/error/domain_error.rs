//! Domain layer errors

use crate::value_objects::{ConnectionId, RoomKeyError};
use thiserror::Error;

/// Errors raised by domain-level operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid room key: {0}")]
    InvalidRoomKey(#[from] RoomKeyError),

    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    #[error("identity not found for target")]
    IdentityNotFound,

    #[error("validation error: {0}")]
    Validation(String),
}
