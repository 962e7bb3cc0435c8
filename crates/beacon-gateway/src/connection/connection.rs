//! Individual WebSocket connection
//!
//! A connection object only exists once its credential has been verified:
//! the handshake is refused before the upgrade otherwise, so an
//! unauthenticated connection is never present in any table.

use crate::protocol::OutboundFrame;
use beacon_core::{ConnectionId, Identity, IdentityId, RoomKey};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};

/// Connection lifecycle state
///
/// `Connecting` and `Authenticating` cover the pre-upgrade handshake and
/// exist so the lifecycle reads end to end; an in-memory `Connection` is
/// created in `Authenticated` and a failed handshake goes straight to
/// `Closed`. Room joins, presence, and action relaying are only valid in
/// `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport accepted, credential not yet examined
    Connecting,
    /// Credential being resolved against the backend
    Authenticating,
    /// Identity attached, setup (room join, presence) in progress
    Authenticated,
    /// Fully operational
    Active,
    /// Teardown in progress
    Disconnecting,
    /// Terminal
    Closed,
}

impl ConnectionState {
    /// Whether moving to `next` is a legal lifecycle transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticating)
                | (Self::Authenticating, Self::Authenticated | Self::Closed)
                | (Self::Authenticated, Self::Active | Self::Disconnecting)
                | (Self::Active, Self::Disconnecting)
                | (Self::Disconnecting, Self::Closed)
        )
    }

    /// Whether the connection is going away (no new memberships allowed).
    #[must_use]
    pub fn is_terminating(self) -> bool {
        matches!(self, Self::Disconnecting | Self::Closed)
    }
}

/// A single authenticated WebSocket connection
pub struct Connection {
    /// Process-unique connection id
    id: ConnectionId,

    /// Identity resolved at handshake; immutable for the connection lifetime
    identity: Identity,

    /// Correlation id injected into every backend call from this connection
    correlation_id: String,

    /// Current lifecycle state
    state: RwLock<ConnectionState>,

    /// Channel to the writer task
    sender: mpsc::Sender<OutboundFrame>,

    /// Rooms this connection is a member of
    rooms: RwLock<HashSet<RoomKey>>,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new connection in `Authenticated` state.
    pub fn new(id: ConnectionId, identity: Identity, sender: mpsc::Sender<OutboundFrame>) -> Arc<Self> {
        Arc::new(Self {
            id,
            identity,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            state: RwLock::new(ConnectionState::Authenticated),
            sender,
            rooms: RwLock::new(HashSet::new()),
            created_at: Instant::now(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn identity_id(&self) -> &IdentityId {
        &self.identity.id
    }

    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Get the current state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Attempt a lifecycle transition; returns false and leaves the state
    /// untouched if the transition is illegal.
    pub async fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write().await;
        if state.can_transition_to(next) {
            *state = next;
            true
        } else {
            tracing::warn!(
                connection_id = %self.id,
                from = ?*state,
                to = ?next,
                "Illegal connection state transition ignored"
            );
            false
        }
    }

    /// Whether frames may be relayed and rooms joined.
    pub async fn is_active(&self) -> bool {
        *self.state.read().await == ConnectionState::Active
    }

    /// Whether the connection is tearing down.
    pub async fn is_terminating(&self) -> bool {
        self.state.read().await.is_terminating()
    }

    /// Add a room membership; returns false if already a member.
    pub async fn join_room(&self, room: RoomKey) -> bool {
        self.rooms.write().await.insert(room)
    }

    /// Remove a room membership; returns false if not a member.
    pub async fn leave_room(&self, room: &RoomKey) -> bool {
        self.rooms.write().await.remove(room)
    }

    /// Current room memberships
    pub async fn rooms(&self) -> Vec<RoomKey> {
        self.rooms.read().await.iter().cloned().collect()
    }

    /// Whether this connection is a member of a room
    pub async fn is_member(&self, room: &RoomKey) -> bool {
        self.rooms.read().await.contains(room)
    }

    /// Send a frame to this connection
    pub async fn send(
        &self,
        frame: OutboundFrame,
    ) -> Result<(), mpsc::error::SendError<OutboundFrame>> {
        self.sender.send(frame).await
    }

    /// Whether the writer side is gone
    #[must_use]
    pub fn is_sender_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Connection age
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("identity", &self.identity.id)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_connection() -> Arc<Connection> {
        let (tx, _rx) = mpsc::channel(8);
        Connection::new(
            ConnectionId::generate(),
            Identity::new("u1", "alice"),
            tx,
        )
    }

    #[tokio::test]
    async fn test_starts_authenticated() {
        let conn = test_connection();
        assert_eq!(conn.state().await, ConnectionState::Authenticated);
        assert!(!conn.is_active().await);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let conn = test_connection();

        assert!(conn.transition(ConnectionState::Active).await);
        assert!(conn.is_active().await);

        assert!(conn.transition(ConnectionState::Disconnecting).await);
        assert!(conn.is_terminating().await);

        assert!(conn.transition(ConnectionState::Closed).await);
        assert_eq!(conn.state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_ignored() {
        let conn = test_connection();

        // Closed is not reachable from Authenticated directly
        assert!(!conn.transition(ConnectionState::Closed).await);
        assert_eq!(conn.state().await, ConnectionState::Authenticated);

        // Cannot resurrect once terminating
        conn.transition(ConnectionState::Active).await;
        conn.transition(ConnectionState::Disconnecting).await;
        assert!(!conn.transition(ConnectionState::Active).await);
    }

    #[test]
    fn test_auth_failure_path() {
        // The pre-upgrade path: Authenticating goes straight to Closed
        assert!(ConnectionState::Authenticating.can_transition_to(ConnectionState::Closed));
        assert!(!ConnectionState::Authenticating.can_transition_to(ConnectionState::Active));
    }

    #[tokio::test]
    async fn test_room_membership_is_idempotent() {
        let conn = test_connection();
        let room = RoomKey::new("group-1").unwrap();

        assert!(conn.join_room(room.clone()).await);
        assert!(!conn.join_room(room.clone()).await);
        assert!(conn.is_member(&room).await);

        assert!(conn.leave_room(&room).await);
        assert!(!conn.leave_room(&room).await);
        assert!(!conn.is_member(&room).await);
    }

    #[tokio::test]
    async fn test_correlation_ids_are_unique_per_connection() {
        let a = test_connection();
        let b = test_connection();
        assert_ne!(a.correlation_id(), b.correlation_id());
    }
}
