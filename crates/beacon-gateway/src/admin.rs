//! Backend-facing administrative surface
//!
//! Backend services hold a `GatewayHandle` to drive the gateway: force
//! room membership, push notifications, and query presence. None of this
//! is reachable from client frames; the corresponding `gateway.*` action
//! names are denylisted at the relay.
//!
//! Event names pushed through the handle are namespaced by the caller's
//! service scope, so `notify("chat.message", ...)` with event `add` reaches
//! clients as `notify:chat.message.add`.

use crate::connection::ConnectionManager;
use crate::dispatch::{scoped_event, MulticastDispatcher, NotifyRequest};
use crate::fanout::FanoutAdapter;
use crate::rooms::RoomMembership;
use beacon_core::{
    ConnectionId, DomainError, IdentityId, PresenceResult, PresenceTracker, RoomKey,
};
use serde_json::Value;
use std::sync::Arc;

/// Whose membership an administrative room operation changes
#[derive(Debug, Clone)]
pub enum RoomTarget {
    /// A specific connection, possibly on another process
    Connection(ConnectionId),
    /// Every connection of an identity, on every process
    Identity(IdentityId),
}

/// Cloneable handle backend services use to drive the gateway
#[derive(Clone)]
pub struct GatewayHandle {
    membership: Arc<RoomMembership>,
    multicast: Arc<MulticastDispatcher>,
    presence: Arc<dyn PresenceTracker>,
    connections: Arc<ConnectionManager>,
    fanout: Arc<dyn FanoutAdapter>,
}

impl GatewayHandle {
    pub(crate) fn new(
        membership: Arc<RoomMembership>,
        multicast: Arc<MulticastDispatcher>,
        presence: Arc<dyn PresenceTracker>,
        connections: Arc<ConnectionManager>,
        fanout: Arc<dyn FanoutAdapter>,
    ) -> Self {
        Self {
            membership,
            multicast,
            presence,
            connections,
            fanout,
        }
    }

    /// Force a target into a room.
    ///
    /// Membership authorization is the calling service's responsibility and
    /// is trusted from here on; it is not revalidated at delivery time.
    pub async fn join_room(&self, target: RoomTarget, room: RoomKey) -> Result<(), DomainError> {
        match target {
            RoomTarget::Connection(connection_id) => {
                self.membership.join_connection(&connection_id, room).await
            }
            RoomTarget::Identity(identity_id) => {
                self.membership.join_identity(&identity_id, room).await;
                Ok(())
            }
        }
    }

    /// Remove a target from a room.
    pub async fn leave_room(&self, target: RoomTarget, room: RoomKey) -> Result<(), DomainError> {
        match target {
            RoomTarget::Connection(connection_id) => {
                self.membership.leave_connection(&connection_id, room).await
            }
            RoomTarget::Identity(identity_id) => {
                self.membership.leave_identity(&identity_id, room).await;
                Ok(())
            }
        }
    }

    /// Deliver to one identity.
    pub async fn unicast(&self, scope: &str, identity_id: &IdentityId, event: &str, payload: Value) {
        self.multicast
            .unicast(identity_id, &scoped_event(scope, event), payload)
            .await;
    }

    /// Deliver to an explicit identity set.
    pub async fn listcast(
        &self,
        scope: &str,
        identity_ids: &[IdentityId],
        event: &str,
        payload: Value,
    ) {
        self.multicast
            .listcast(identity_ids, &scoped_event(scope, event), payload)
            .await;
    }

    /// Deliver to all members of a room.
    pub async fn roomcast(&self, scope: &str, room: RoomKey, event: &str, payload: Value) {
        self.multicast
            .roomcast(room, &scoped_event(scope, event), payload)
            .await;
    }

    /// Deliver to every connected socket on every process.
    pub async fn broadcast(&self, scope: &str, event: &str, payload: Value) {
        self.multicast
            .broadcast(&scoped_event(scope, event), payload)
            .await;
    }

    /// Handle a raw delivery request; the event name is namespaced under
    /// the caller's scope before dispatch. Returns false for malformed or
    /// unknown delivery modes (fail-closed).
    pub async fn notify(&self, scope: &str, mut request: NotifyRequest) -> bool {
        request.event_name = scoped_event(scope, &request.event_name);
        self.multicast.notify(request).await
    }

    /// Whether an identity has at least one open connection anywhere.
    pub async fn is_online(&self, identity_id: &IdentityId) -> PresenceResult<bool> {
        self.presence.is_online(identity_id).await
    }

    /// Batch presence query, result aligned with input order.
    pub async fn is_online_batch(&self, identity_ids: &[IdentityId]) -> PresenceResult<Vec<bool>> {
        self.presence.is_online_batch(identity_ids).await
    }

    /// Connections currently held by this process.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.connection_count()
    }

    /// Whether the fan-out backbone is currently unreachable.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.fanout.is_degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::fanout::LocalFanout;
    use crate::protocol::OutboundFrame;
    use beacon_cache::MemoryPresence;
    use beacon_core::{Identity, ProcessId};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn handle() -> (GatewayHandle, Arc<ConnectionManager>) {
        let connections = ConnectionManager::new_shared();
        let fanout: Arc<dyn FanoutAdapter> =
            Arc::new(LocalFanout::new(connections.clone(), ProcessId::new("p1")));
        let membership = Arc::new(RoomMembership::new(connections.clone(), fanout.clone()));
        let multicast = Arc::new(MulticastDispatcher::new(fanout.clone()));
        let presence: Arc<dyn PresenceTracker> = Arc::new(MemoryPresence::new(60));
        (
            GatewayHandle::new(membership, multicast, presence, connections.clone(), fanout),
            connections,
        )
    }

    async fn connect(
        connections: &ConnectionManager,
        identity: &str,
    ) -> (Arc<Connection>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        let conn = Connection::new(
            ConnectionId::generate(),
            Identity::new(identity, identity),
            tx,
        );
        connections.insert(conn.clone());
        connections
            .join_room(conn.id(), RoomKey::identity(conn.identity_id()))
            .await;
        (conn, rx)
    }

    #[tokio::test]
    async fn test_join_room_by_connection_and_roomcast() {
        let (handle, connections) = handle();
        let (conn, mut rx) = connect(&connections, "u1").await;
        let room = RoomKey::new("group-1").unwrap();

        handle
            .join_room(RoomTarget::Connection(conn.id().clone()), room.clone())
            .await
            .unwrap();

        handle
            .roomcast("group", room, "add", json!({"memberId": "u1"}))
            .await;

        match rx.try_recv().unwrap() {
            OutboundFrame::Push(push) => {
                assert_eq!(push.event_name, "notify:group.add");
            }
            OutboundFrame::Reply(_) => panic!("expected push"),
        }
    }

    #[tokio::test]
    async fn test_join_room_by_identity_covers_all_devices() {
        let (handle, connections) = handle();
        let (first, _rx1) = connect(&connections, "u1").await;
        let (second, _rx2) = connect(&connections, "u1").await;
        let room = RoomKey::new("group-1").unwrap();

        handle
            .join_room(
                RoomTarget::Identity(IdentityId::new("u1")),
                room.clone(),
            )
            .await
            .unwrap();

        assert!(first.is_member(&room).await);
        assert!(second.is_member(&room).await);
    }

    #[tokio::test]
    async fn test_join_unknown_connection_fails() {
        let (handle, _connections) = handle();
        let result = handle
            .join_room(
                RoomTarget::Connection(ConnectionId::new("ghost")),
                RoomKey::new("r").unwrap(),
            )
            .await;
        assert!(matches!(result, Err(DomainError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_notify_applies_scope() {
        let (handle, connections) = handle();
        let (_conn, mut rx) = connect(&connections, "u1").await;

        let delivered = handle
            .notify(
                "friend",
                NotifyRequest {
                    mode: "unicast".to_string(),
                    target: json!("u1"),
                    event_name: "add".to_string(),
                    payload: json!({"from": "u2"}),
                },
            )
            .await;

        assert!(delivered);
        match rx.try_recv().unwrap() {
            OutboundFrame::Push(push) => assert_eq!(push.event_name, "notify:friend.add"),
            OutboundFrame::Reply(_) => panic!("expected push"),
        }
    }
}
