//! Serialized fan-out traffic
//!
//! Two payload shapes travel the backbone: delivery envelopes (events to
//! re-deliver to local room members) and membership commands (join/leave
//! applied by whichever process owns the target). Both carry the origin
//! process id so a publisher can skip its own messages - local delivery
//! already happened before the publish.

use beacon_core::{ConnectionId, IdentityId, ProcessId, RoomKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who a delivery is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryTarget {
    /// Every member of any of these rooms (deduplicated per connection)
    Rooms { rooms: Vec<RoomKey> },
    /// Every connection on every process
    Everyone,
}

impl DeliveryTarget {
    /// Target a single room
    #[must_use]
    pub fn room(room: RoomKey) -> Self {
        Self::Rooms { rooms: vec![room] }
    }
}

/// A room event crossing the backbone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    /// Publishing process
    pub origin: ProcessId,
    pub target: DeliveryTarget,
    pub event_name: String,
    pub payload: Value,
}

impl DeliveryEnvelope {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Join or leave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipOp {
    Join,
    Leave,
}

/// Whose membership a command changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemberTarget {
    /// One specific connection, wherever it lives
    Connection { connection_id: ConnectionId },
    /// Every connection of an identity, on every process
    Identity { identity_id: IdentityId },
}

/// A membership change crossing the backbone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipCommand {
    /// Publishing process
    pub origin: ProcessId,
    pub op: MembershipOp,
    pub target: MemberTarget,
    pub room: RoomKey,
}

impl MembershipCommand {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
