//! Pub/Sub channel definitions.
//!
//! Two shared channels carry all cross-process traffic: delivery envelopes
//! (room events to re-deliver locally) and membership commands (force-join /
//! leave addressed to the process that owns a connection). Every gateway
//! process subscribes to both.

/// Channel carrying delivery envelopes
pub const DELIVERY_CHANNEL: &str = "beacon:fanout:deliveries";
/// Channel carrying membership commands
pub const MEMBERSHIP_CHANNEL: &str = "beacon:fanout:membership";

/// Pub/Sub channel types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FanoutChannel {
    /// Room delivery envelopes, fanned out to every process
    Deliveries,
    /// Cross-process membership commands
    Membership,
    /// Custom channel name
    Custom(String),
}

impl FanoutChannel {
    /// Get the Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Deliveries => DELIVERY_CHANNEL.to_string(),
            Self::Membership => MEMBERSHIP_CHANNEL.to_string(),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parse a channel name back to a `FanoutChannel`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            DELIVERY_CHANNEL => Self::Deliveries,
            MEMBERSHIP_CHANNEL => Self::Membership,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for FanoutChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
