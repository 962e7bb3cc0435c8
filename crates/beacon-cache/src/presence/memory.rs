//! In-memory online registry.
//!
//! Presence for single-process deployments: same contract as the Redis
//! store, with expiries tracked as `Instant`s and pruned lazily on read.

use async_trait::async_trait;
use beacon_core::{ConnectionId, IdentityId, PresenceError, PresenceResult, PresenceTracker, ProcessId};
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// In-memory presence tracker
pub struct MemoryPresence {
    /// identity -> (connection -> expiry)
    records: DashMap<IdentityId, HashMap<ConnectionId, Instant>>,
    ttl: Duration,
}

impl MemoryPresence {
    #[must_use]
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            records: DashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Drop expired records for one identity; returns whether any live
    /// record remains.
    fn prune(&self, identity_id: &IdentityId) -> bool {
        let now = Instant::now();
        if let Some(mut entry) = self.records.get_mut(identity_id) {
            entry.retain(|_, expiry| *expiry > now);
            if !entry.is_empty() {
                return true;
            }
        }
        self.records
            .remove_if(identity_id, |_, conns| conns.is_empty());
        false
    }
}

#[async_trait]
impl PresenceTracker for MemoryPresence {
    async fn mark_online(
        &self,
        identity_id: &IdentityId,
        connection_id: &ConnectionId,
        _owner: &ProcessId,
    ) -> PresenceResult<()> {
        let expiry = Instant::now() + self.ttl;
        self.records
            .entry(identity_id.clone())
            .or_default()
            .insert(connection_id.clone(), expiry);
        Ok(())
    }

    async fn refresh(&self, identity_id: &IdentityId) -> PresenceResult<()> {
        let expiry = Instant::now() + self.ttl;
        if let Some(mut entry) = self.records.get_mut(identity_id) {
            for record in entry.values_mut() {
                *record = expiry;
            }
        }
        Ok(())
    }

    async fn mark_offline(
        &self,
        identity_id: &IdentityId,
        connection_id: &ConnectionId,
    ) -> PresenceResult<()> {
        if let Some(mut entry) = self.records.get_mut(identity_id) {
            entry.remove(connection_id);
        }
        self.records
            .remove_if(identity_id, |_, conns| conns.is_empty());
        Ok(())
    }

    async fn is_online(&self, identity_id: &IdentityId) -> PresenceResult<bool> {
        Ok(self.prune(identity_id))
    }

    async fn is_online_batch(&self, identity_ids: &[IdentityId]) -> PresenceResult<Vec<bool>> {
        let mut statuses = Vec::with_capacity(identity_ids.len());
        for identity_id in identity_ids {
            statuses.push(self.prune(identity_id));
        }
        Ok(statuses)
    }
}
