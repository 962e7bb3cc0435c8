//! Single-process fan-out
//!
//! Everything resolves against the in-process connection manager. Delivery
//! is synchronous and totally ordered within the process; no network calls
//! are made and degraded mode cannot occur.

use super::{
    apply_membership_local, deliver_local, DeliveryTarget, FanoutAdapter, MembershipCommand,
};
use crate::connection::ConnectionManager;
use async_trait::async_trait;
use beacon_core::{ConnectionId, ProcessId};
use serde_json::Value;
use std::sync::Arc;

/// Local-only fan-out adapter
pub struct LocalFanout {
    connections: Arc<ConnectionManager>,
    process_id: ProcessId,
}

impl LocalFanout {
    #[must_use]
    pub fn new(connections: Arc<ConnectionManager>, process_id: ProcessId) -> Self {
        Self {
            connections,
            process_id,
        }
    }
}

#[async_trait]
impl FanoutAdapter for LocalFanout {
    async fn publish(&self, target: DeliveryTarget, event_name: &str, payload: Value) -> usize {
        deliver_local(&self.connections, &target, event_name, payload).await
    }

    async fn announce_connection(&self, _connection_id: &ConnectionId) {}

    async fn refresh_connection(&self, _connection_id: &ConnectionId) {}

    async fn retire_connection(&self, _connection_id: &ConnectionId) {}

    async fn locate_connection(&self, connection_id: &ConnectionId) -> Option<ProcessId> {
        self.connections
            .contains(connection_id)
            .then(|| self.process_id.clone())
    }

    async fn forward_membership(&self, command: MembershipCommand) -> bool {
        apply_membership_local(&self.connections, &command).await > 0
    }

    fn is_degraded(&self) -> bool {
        false
    }

    fn process_id(&self) -> &ProcessId {
        &self.process_id
    }
}
