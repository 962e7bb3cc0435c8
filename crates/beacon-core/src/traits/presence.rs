//! Presence tracker boundary.
//!
//! An online registry keyed by identity, with one record per connection so
//! multi-device identities stay online until their last connection drops.
//! Records carry a TTL: a crashed process leaves records that self-expire
//! instead of lingering forever.

use crate::value_objects::{ConnectionId, IdentityId, ProcessId};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from the presence store.
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("presence store error: {0}")]
    Store(String),
}

/// Result type for presence operations.
pub type PresenceResult<T> = Result<T, PresenceError>;

/// TTL-backed online registry.
#[async_trait]
pub trait PresenceTracker: Send + Sync {
    /// Record a connection as online for an identity.
    async fn mark_online(
        &self,
        identity_id: &IdentityId,
        connection_id: &ConnectionId,
        owner: &ProcessId,
    ) -> PresenceResult<()>;

    /// Refresh the TTL of an identity's records (heartbeat path).
    async fn refresh(&self, identity_id: &IdentityId) -> PresenceResult<()>;

    /// Remove one connection's record (graceful disconnect path).
    async fn mark_offline(
        &self,
        identity_id: &IdentityId,
        connection_id: &ConnectionId,
    ) -> PresenceResult<()>;

    /// Whether at least one non-expired record exists for the identity.
    async fn is_online(&self, identity_id: &IdentityId) -> PresenceResult<bool>;

    /// Batch form of `is_online`, result aligned with the input order.
    async fn is_online_batch(&self, identity_ids: &[IdentityId]) -> PresenceResult<Vec<bool>>;
}
