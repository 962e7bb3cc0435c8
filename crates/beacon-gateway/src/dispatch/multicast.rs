//! Multicast dispatcher
//!
//! Four delivery modes on top of the fan-out adapter. All of them are
//! fire-and-forget for the caller: no delivery acknowledgment exists, and
//! adapter trouble degrades scope rather than surfacing an error.

use crate::fanout::{DeliveryTarget, FanoutAdapter};
use beacon_core::{IdentityId, RoomKey};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Build the namespaced on-the-wire event name for a backend service.
///
/// Namespacing by the originating service keeps event names from colliding
/// across services: `scoped_event("chat.message", "add")` is
/// `notify:chat.message.add`.
#[must_use]
pub fn scoped_event(scope: &str, event: &str) -> String {
    format!("notify:{scope}.{event}")
}

/// The four delivery modes, parsed and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Multicast {
    /// One identity's devices
    Unicast { identity_id: IdentityId },
    /// An explicit identity set
    Listcast { identity_ids: Vec<IdentityId> },
    /// Members of one room
    Roomcast { room: RoomKey },
    /// Every connected socket on every process
    Broadcast,
}

impl Multicast {
    fn into_target(self) -> DeliveryTarget {
        match self {
            Self::Unicast { identity_id } => {
                DeliveryTarget::room(RoomKey::identity(&identity_id))
            }
            Self::Listcast { identity_ids } => DeliveryTarget::Rooms {
                rooms: identity_ids.iter().map(RoomKey::identity).collect(),
            },
            Self::Roomcast { room } => DeliveryTarget::room(room),
            Self::Broadcast => DeliveryTarget::Everyone,
        }
    }
}

/// A delivery request as it arrives from a backend service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    /// One of "unicast", "listcast", "roomcast", "broadcast"
    pub mode: String,

    /// Target interpretation depends on the mode; absent for broadcast
    #[serde(default)]
    pub target: Value,

    pub event_name: String,

    #[serde(default)]
    pub payload: Value,
}

impl NotifyRequest {
    /// Validate the mode/target pair. Fail-closed: anything that does not
    /// parse into one of the four modes is rejected.
    pub fn parse(&self) -> Result<Multicast, String> {
        match self.mode.as_str() {
            "unicast" => match self.target.as_str() {
                Some(id) if !id.is_empty() => Ok(Multicast::Unicast {
                    identity_id: IdentityId::new(id),
                }),
                _ => Err("unicast requires a string target".to_string()),
            },
            "listcast" => match self.target.as_array() {
                Some(ids) => {
                    let identity_ids: Option<Vec<IdentityId>> = ids
                        .iter()
                        .map(|v| v.as_str().map(IdentityId::from))
                        .collect();
                    identity_ids
                        .filter(|ids| !ids.is_empty())
                        .map(|identity_ids| Multicast::Listcast { identity_ids })
                        .ok_or_else(|| "listcast requires a non-empty string array target".to_string())
                }
                None => Err("listcast requires an array target".to_string()),
            },
            "roomcast" => match self.target.as_str() {
                Some(key) => RoomKey::new(key)
                    .map(|room| Multicast::Roomcast { room })
                    .map_err(|e| format!("roomcast target invalid: {e}")),
                None => Err("roomcast requires a string target".to_string()),
            },
            "broadcast" => Ok(Multicast::Broadcast),
            other => Err(format!("unknown delivery mode: {other}")),
        }
    }
}

/// Multicast dispatcher over a fan-out adapter
pub struct MulticastDispatcher {
    fanout: Arc<dyn FanoutAdapter>,
}

impl MulticastDispatcher {
    #[must_use]
    pub fn new(fanout: Arc<dyn FanoutAdapter>) -> Self {
        Self { fanout }
    }

    /// Deliver to one identity's private room.
    pub async fn unicast(&self, identity_id: &IdentityId, event_name: &str, payload: Value) {
        self.dispatch(
            Multicast::Unicast {
                identity_id: identity_id.clone(),
            },
            event_name,
            payload,
        )
        .await;
    }

    /// Deliver to the union of the identities' private rooms; one fan-out
    /// call, each connection served once.
    pub async fn listcast(&self, identity_ids: &[IdentityId], event_name: &str, payload: Value) {
        if identity_ids.is_empty() {
            return;
        }
        self.dispatch(
            Multicast::Listcast {
                identity_ids: identity_ids.to_vec(),
            },
            event_name,
            payload,
        )
        .await;
    }

    /// Deliver to all current members of a room.
    pub async fn roomcast(&self, room: RoomKey, event_name: &str, payload: Value) {
        self.dispatch(Multicast::Roomcast { room }, event_name, payload)
            .await;
    }

    /// Deliver to every connected socket on every process.
    pub async fn broadcast(&self, event_name: &str, payload: Value) {
        self.dispatch(Multicast::Broadcast, event_name, payload).await;
    }

    /// Dispatch a parsed multicast.
    pub async fn dispatch(&self, multicast: Multicast, event_name: &str, payload: Value) -> usize {
        tracing::debug!(
            event_name = %event_name,
            mode = ?multicast,
            "Dispatching multicast"
        );
        self.fanout
            .publish(multicast.into_target(), event_name, payload)
            .await
    }

    /// Handle a raw delivery request from a backend service. Unknown or
    /// malformed requests are logged and dropped, never delivered.
    pub async fn notify(&self, request: NotifyRequest) -> bool {
        match request.parse() {
            Ok(multicast) => {
                self.dispatch(multicast, &request.event_name, request.payload)
                    .await;
                true
            }
            Err(reason) => {
                tracing::warn!(
                    mode = %request.mode,
                    event_name = %request.event_name,
                    reason = %reason,
                    "Rejected delivery request"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionManager};
    use crate::fanout::LocalFanout;
    use crate::protocol::OutboundFrame;
    use beacon_core::{ConnectionId, Identity, ProcessId};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn setup() -> (MulticastDispatcher, Arc<ConnectionManager>) {
        let connections = ConnectionManager::new_shared();
        let fanout = Arc::new(LocalFanout::new(connections.clone(), ProcessId::new("p1")));
        (MulticastDispatcher::new(fanout), connections)
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
        // Auto-join into the identity-private room, as the server does
        connections
            .join_room(conn.id(), RoomKey::identity(conn.identity_id()))
            .await;
        (conn, rx)
    }

    #[test]
    fn test_scoped_event() {
        assert_eq!(scoped_event("chat.message", "add"), "notify:chat.message.add");
    }

    #[tokio::test]
    async fn test_unicast_reaches_all_devices_of_identity() {
        let (dispatcher, connections) = setup();
        let (_first, mut rx1) = connect(&connections, "u1").await;
        let (_second, mut rx2) = connect(&connections, "u1").await;
        let (_other, mut rx3) = connect(&connections, "u2").await;

        dispatcher
            .unicast(&IdentityId::new("u1"), "notify:friend.add", json!({"id": 1}))
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_listcast_serves_each_connection_once() {
        let (dispatcher, connections) = setup();
        let (_a, mut rx_a) = connect(&connections, "u1").await;
        let (_b, mut rx_b) = connect(&connections, "u2").await;

        dispatcher
            .listcast(
                &[IdentityId::new("u1"), IdentityId::new("u2")],
                "ev",
                json!(null),
            )
            .await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_notify_unknown_mode_is_fail_closed() {
        let (dispatcher, connections) = setup();
        let (_conn, mut rx) = connect(&connections, "u1").await;

        let delivered = dispatcher
            .notify(NotifyRequest {
                mode: "multicast-all".to_string(),
                target: json!("u1"),
                event_name: "ev".to_string(),
                payload: json!(null),
            })
            .await;

        assert!(!delivered);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notify_mode_target_mismatch_is_rejected() {
        let (dispatcher, connections) = setup();
        let (_conn, mut rx) = connect(&connections, "u1").await;

        // listcast with a scalar target must not fall back to unicast
        let delivered = dispatcher
            .notify(NotifyRequest {
                mode: "listcast".to_string(),
                target: json!("u1"),
                event_name: "ev".to_string(),
                payload: json!(null),
            })
            .await;

        assert!(!delivered);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notify_roomcast_delivers() {
        let (dispatcher, connections) = setup();
        let (conn, mut rx) = connect(&connections, "u1").await;
        let room = RoomKey::new("group-1").unwrap();
        connections.join_room(conn.id(), room.clone()).await;

        let delivered = dispatcher
            .notify(NotifyRequest {
                mode: "roomcast".to_string(),
                target: json!("group-1"),
                event_name: scoped_event("group", "updateInfo"),
                payload: json!({"name": "renamed"}),
            })
            .await;

        assert!(delivered);
        let frame = rx.try_recv().unwrap();
        match frame {
            OutboundFrame::Push(push) => {
                assert_eq!(push.event_name, "notify:group.updateInfo");
                assert_eq!(push.payload["name"], "renamed");
            }
            OutboundFrame::Reply(_) => panic!("expected push frame"),
        }
    }

    #[test]
    fn test_parse_broadcast_ignores_target() {
        let request = NotifyRequest {
            mode: "broadcast".to_string(),
            target: Value::Null,
            event_name: "ev".to_string(),
            payload: json!(null),
        };
        assert_eq!(request.parse(), Ok(Multicast::Broadcast));
    }
}
