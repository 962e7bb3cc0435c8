//! Room membership manager
//!
//! Composes the local connection table with the fan-out adapter: joins and
//! leaves apply locally and are visible to local dispatch immediately;
//! operations on connections held by other processes resolve through the
//! adapter's ownership registry and travel as forwarded commands.

use crate::connection::{Connection, ConnectionManager};
use crate::fanout::{FanoutAdapter, MemberTarget, MembershipCommand, MembershipOp};
use beacon_core::{ConnectionId, DomainError, IdentityId, ProcessId, RoomKey};
use std::sync::Arc;

/// Where a connection id resolved to
#[derive(Debug, Clone)]
pub enum ConnectionRef {
    /// Held by this process
    Local(Arc<Connection>),
    /// Held by another gateway process
    Remote(ProcessId),
}

/// Membership manager
pub struct RoomMembership {
    connections: Arc<ConnectionManager>,
    fanout: Arc<dyn FanoutAdapter>,
}

impl RoomMembership {
    #[must_use]
    pub fn new(connections: Arc<ConnectionManager>, fanout: Arc<dyn FanoutAdapter>) -> Self {
        Self { connections, fanout }
    }

    /// Join a local connection to a room. Idempotent; a no-op when the
    /// connection is unknown or already disconnecting.
    pub async fn join(&self, connection_id: &ConnectionId, room: RoomKey) -> bool {
        self.connections.join_room(connection_id, room).await
    }

    /// Remove a local connection from a room. Safe on non-members.
    pub async fn leave(&self, connection_id: &ConnectionId, room: &RoomKey) -> bool {
        self.connections.leave_room(connection_id, room).await
    }

    /// Resolve a connection id to a handle, consulting the fan-out
    /// adapter's registry when it is not held locally.
    pub async fn resolve_connection(&self, connection_id: &ConnectionId) -> Option<ConnectionRef> {
        if let Some(connection) = self.connections.get(connection_id) {
            return Some(ConnectionRef::Local(connection));
        }

        match self.fanout.locate_connection(connection_id).await {
            Some(owner) if &owner != self.fanout.process_id() => {
                Some(ConnectionRef::Remote(owner))
            }
            // The registry claims we own it but the local table disagrees:
            // the record is stale, treat as not found.
            _ => None,
        }
    }

    /// Join a possibly-remote connection to a room.
    ///
    /// Used by backend actions that only know a connection id. Errors with
    /// `ConnectionNotFound` once every process has been exhausted.
    pub async fn join_connection(
        &self,
        connection_id: &ConnectionId,
        room: RoomKey,
    ) -> Result<(), DomainError> {
        match self.resolve_connection(connection_id).await {
            Some(ConnectionRef::Local(_)) => {
                self.join(connection_id, room).await;
                Ok(())
            }
            Some(ConnectionRef::Remote(owner)) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    owner = %owner,
                    room = %room,
                    "Forwarding join to owning process"
                );
                self.fanout
                    .forward_membership(MembershipCommand {
                        origin: self.fanout.process_id().clone(),
                        op: MembershipOp::Join,
                        target: MemberTarget::Connection {
                            connection_id: connection_id.clone(),
                        },
                        room,
                    })
                    .await;
                Ok(())
            }
            None => Err(DomainError::ConnectionNotFound(connection_id.clone())),
        }
    }

    /// Remove a possibly-remote connection from a room.
    pub async fn leave_connection(
        &self,
        connection_id: &ConnectionId,
        room: RoomKey,
    ) -> Result<(), DomainError> {
        match self.resolve_connection(connection_id).await {
            Some(ConnectionRef::Local(_)) => {
                self.leave(connection_id, &room).await;
                Ok(())
            }
            Some(ConnectionRef::Remote(_)) => {
                self.fanout
                    .forward_membership(MembershipCommand {
                        origin: self.fanout.process_id().clone(),
                        op: MembershipOp::Leave,
                        target: MemberTarget::Connection {
                            connection_id: connection_id.clone(),
                        },
                        room,
                    })
                    .await;
                Ok(())
            }
            None => Err(DomainError::ConnectionNotFound(connection_id.clone())),
        }
    }

    /// Join every connection of an identity (on every process) to a room.
    pub async fn join_identity(&self, identity_id: &IdentityId, room: RoomKey) {
        self.fanout
            .forward_membership(MembershipCommand {
                origin: self.fanout.process_id().clone(),
                op: MembershipOp::Join,
                target: MemberTarget::Identity {
                    identity_id: identity_id.clone(),
                },
                room,
            })
            .await;
    }

    /// Remove every connection of an identity from a room.
    pub async fn leave_identity(&self, identity_id: &IdentityId, room: RoomKey) {
        self.fanout
            .forward_membership(MembershipCommand {
                origin: self.fanout.process_id().clone(),
                op: MembershipOp::Leave,
                target: MemberTarget::Identity {
                    identity_id: identity_id.clone(),
                },
                room,
            })
            .await;
    }

    /// Drop all memberships of a connection (disconnect teardown step).
    pub async fn remove_all(&self, connection: &Connection) {
        for room in connection.rooms().await {
            self.connections.leave_room(connection.id(), &room).await;
        }
    }
}
