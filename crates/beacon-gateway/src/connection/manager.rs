//! Connection manager
//!
//! Holds every live connection on this process plus the local room table.
//! Rooms exist only as member sets: first join creates the entry, last
//! leave removes it.

use super::Connection;
use crate::protocol::{OutboundFrame, PushFrame};
use beacon_core::{ConnectionId, RoomKey};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Manages all active WebSocket connections on this process
///
/// Uses `DashMap` for concurrent access to connection state.
pub struct ConnectionManager {
    /// Active connections by connection id
    connections: DashMap<ConnectionId, Arc<Connection>>,

    /// Room key to member connection ids
    rooms: DashMap<RoomKey, HashSet<ConnectionId>>,
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a connection
    pub fn insert(&self, connection: Arc<Connection>) {
        tracing::debug!(connection_id = %connection.id(), "Connection added");
        self.connections.insert(connection.id().clone(), connection);
    }

    /// Remove a connection and all of its room memberships.
    ///
    /// Uses `alter`/`retain` for atomic modify-and-cleanup to avoid TOCTOU
    /// races with concurrent joins.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        if let Some((_, connection)) = self.connections.remove(connection_id) {
            for room in connection.rooms().await {
                self.rooms.alter(&room, |_, mut members| {
                    members.remove(connection_id);
                    members
                });
            }
            self.rooms.retain(|_, members| !members.is_empty());

            tracing::debug!(connection_id = %connection_id, "Connection removed");
        }
    }

    /// Get a connection by id
    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(connection_id).map(|r| r.clone())
    }

    /// Check if a connection lives on this process
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Add a connection to a room. Idempotent; a no-op (returning false)
    /// when the connection is unknown or already tearing down.
    pub async fn join_room(&self, connection_id: &ConnectionId, room: RoomKey) -> bool {
        let Some(connection) = self.get(connection_id) else {
            return false;
        };
        // Never resurrect a dying connection's membership
        if connection.is_terminating().await {
            tracing::debug!(
                connection_id = %connection_id,
                room = %room,
                "Join ignored: connection is disconnecting"
            );
            return false;
        }

        connection.join_room(room.clone()).await;
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(connection_id.clone());

        tracing::trace!(connection_id = %connection_id, room = %room, "Joined room");
        true
    }

    /// Remove a connection from a room. Safe to call on a non-member.
    pub async fn leave_room(&self, connection_id: &ConnectionId, room: &RoomKey) -> bool {
        let Some(connection) = self.get(connection_id) else {
            return false;
        };
        connection.leave_room(room).await;

        self.rooms.alter(room, |_, mut members| {
            members.remove(connection_id);
            members
        });
        self.rooms.retain(|_, members| !members.is_empty());

        tracing::trace!(connection_id = %connection_id, room = %room, "Left room");
        true
    }

    /// Current members of a room
    pub fn members_of(&self, room: &RoomKey) -> Vec<Arc<Connection>> {
        self.rooms
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| self.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Deliver a push frame to every member of the given rooms. A
    /// connection in several of the rooms receives the frame once.
    pub async fn send_to_rooms(&self, rooms: &[RoomKey], frame: PushFrame) -> usize {
        let mut targets: HashSet<ConnectionId> = HashSet::new();
        for room in rooms {
            if let Some(members) = self.rooms.get(room) {
                targets.extend(members.iter().cloned());
            }
        }

        let mut sent = 0;
        for connection_id in targets {
            if let Some(connection) = self.get(&connection_id) {
                if connection
                    .send(OutboundFrame::Push(frame.clone()))
                    .await
                    .is_ok()
                {
                    sent += 1;
                }
            }
        }

        tracing::trace!(rooms = rooms.len(), sent = sent, "Delivered to rooms");
        sent
    }

    /// Deliver a push frame to every connection on this process
    pub async fn broadcast(&self, frame: PushFrame) -> usize {
        let connections: Vec<Arc<Connection>> =
            self.connections.iter().map(|r| r.clone()).collect();

        let mut sent = 0;
        for connection in connections {
            if connection
                .send(OutboundFrame::Push(frame.clone()))
                .await
                .is_ok()
            {
                sent += 1;
            }
        }

        tracing::debug!(sent = sent, "Broadcast to all local connections");
        sent
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of rooms with at least one local member
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .field("rooms", &self.rooms.len())
            .finish()
    }
}
