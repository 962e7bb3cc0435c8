//! Wire frame definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound frame: a client-initiated action call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionFrame {
    /// Backend action to invoke
    pub action_name: String,

    /// Arbitrary action payload
    #[serde(default)]
    pub payload: Value,

    /// Opaque acknowledgment id. Absent means fire-and-forget: no reply
    /// frame is sent for this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<Value>,
}

impl ActionFrame {
    /// Deserialize from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether the client asked for a reply
    #[must_use]
    pub fn wants_reply(&self) -> bool {
        self.ack_id.is_some()
    }
}

/// Result of relaying an action, before it is bound to an `ackId`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyEnvelope {
    pub success: bool,
    pub data: Option<Value>,
    pub message: Option<String>,
}

impl ReplyEnvelope {
    /// Successful reply carrying the handler's data
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Failure reply carrying a human-readable message only
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Bind to the ack id the client supplied
    #[must_use]
    pub fn into_frame(self, ack_id: Value) -> ReplyFrame {
        ReplyFrame {
            ack_id,
            success: self.success,
            data: self.data,
            message: self.message,
        }
    }
}

/// Outbound reply frame answering an acknowledged action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyFrame {
    pub ack_id: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outbound push frame: an unsolicited multicast delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFrame {
    pub event_name: String,
    pub payload: Value,
}

impl PushFrame {
    pub fn new(event_name: impl Into<String>, payload: Value) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
        }
    }
}

/// Any frame the gateway writes to a socket
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Reply(ReplyFrame),
    Push(PushFrame),
}

impl OutboundFrame {
    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<ReplyFrame> for OutboundFrame {
    fn from(frame: ReplyFrame) -> Self {
        Self::Reply(frame)
    }
}

impl From<PushFrame> for OutboundFrame {
    fn from(frame: PushFrame) -> Self {
        Self::Push(frame)
    }
}
