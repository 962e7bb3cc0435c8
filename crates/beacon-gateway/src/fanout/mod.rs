//! Fan-out adapters
//!
//! The adapter abstracts how room deliveries and membership reach sockets
//! held by other gateway processes. `LocalFanout` is the single-process
//! no-op variant; `ClusterFanout` rides a Redis pub/sub backbone. The
//! variant is chosen once at startup from configuration and injected;
//! callers never branch on it.
//!
//! Adapter methods are deliberately infallible at the call site: a broken
//! backbone degrades delivery scope (same-process members still receive
//! everything) and flips the degraded flag, it never fails a multicast or
//! terminates a connection.

mod cluster;
mod envelope;
mod local;

pub use cluster::{ClusterFanout, ClusterFanoutConfig};
pub use envelope::{DeliveryEnvelope, DeliveryTarget, MemberTarget, MembershipCommand, MembershipOp};
pub use local::LocalFanout;

use crate::connection::ConnectionManager;
use crate::protocol::PushFrame;
use async_trait::async_trait;
use beacon_core::{ConnectionId, ProcessId, RoomKey};
use serde_json::Value;

/// Cross-process delivery and membership backbone.
#[async_trait]
pub trait FanoutAdapter: Send + Sync {
    /// Deliver an event to the target set, locally and (in clustered mode)
    /// on every other process. Returns the local delivery count.
    async fn publish(&self, target: DeliveryTarget, event_name: &str, payload: Value) -> usize;

    /// Record this process as the owner of a connection.
    async fn announce_connection(&self, connection_id: &ConnectionId);

    /// Refresh the ownership record (keepalive path).
    async fn refresh_connection(&self, connection_id: &ConnectionId);

    /// Drop the ownership record.
    async fn retire_connection(&self, connection_id: &ConnectionId);

    /// Which process owns a connection, checking local state before the
    /// shared registry. `None` means no process knows it.
    async fn locate_connection(&self, connection_id: &ConnectionId) -> Option<ProcessId>;

    /// Apply a membership command locally and forward it to the process
    /// that owns the target. Returns whether it was applied or forwarded.
    async fn forward_membership(&self, command: MembershipCommand) -> bool;

    /// Whether the backbone is currently unreachable.
    fn is_degraded(&self) -> bool;

    /// This process's id.
    fn process_id(&self) -> &ProcessId;
}

/// Deliver an envelope's event to the local sockets its target names.
pub(crate) async fn deliver_local(
    connections: &ConnectionManager,
    target: &DeliveryTarget,
    event_name: &str,
    payload: Value,
) -> usize {
    let frame = PushFrame::new(event_name, payload);
    match target {
        DeliveryTarget::Rooms { rooms } => connections.send_to_rooms(rooms, frame).await,
        DeliveryTarget::Everyone => connections.broadcast(frame).await,
    }
}

/// Apply a membership command to whatever part of its target lives here.
/// Returns how many local connections were affected.
pub(crate) async fn apply_membership_local(
    connections: &ConnectionManager,
    command: &MembershipCommand,
) -> usize {
    let apply = |connection_id: ConnectionId, room: RoomKey, op: MembershipOp| async move {
        match op {
            MembershipOp::Join => connections.join_room(&connection_id, room).await,
            MembershipOp::Leave => connections.leave_room(&connection_id, &room).await,
        }
    };

    match &command.target {
        MemberTarget::Connection { connection_id } => {
            if connections.contains(connection_id)
                && apply(connection_id.clone(), command.room.clone(), command.op).await
            {
                1
            } else {
                0
            }
        }
        MemberTarget::Identity { identity_id } => {
            let private_room = RoomKey::identity(identity_id);
            let mut affected = 0;
            for member in connections.members_of(&private_room) {
                if apply(member.id().clone(), command.room.clone(), command.op).await {
                    affected += 1;
                }
            }
            affected
        }
    }
}
