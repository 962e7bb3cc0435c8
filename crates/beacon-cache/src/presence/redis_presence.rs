//! Redis-backed online registry.
//!
//! One hash per identity: `online:{identityId}` maps connection id to the
//! owning process id. The whole hash carries a TTL refreshed on connect and
//! heartbeat; a graceful disconnect deletes the field (Redis drops the hash
//! once its last field is removed, so `EXISTS` doubles as the online test).
//! A crashed process simply stops refreshing and the record self-expires.

use crate::pool::{RedisPool, RedisPoolError, RedisResult};
use async_trait::async_trait;
use beacon_core::{ConnectionId, IdentityId, PresenceError, PresenceResult, PresenceTracker, ProcessId};
use redis::AsyncCommands;

/// Key prefix for per-identity online hashes
pub const ONLINE_KEY_PREFIX: &str = "online:";

/// Redis-backed presence tracker
#[derive(Clone)]
pub struct RedisPresence {
    pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisPresence {
    /// Create a new tracker over a pool; `ttl_seconds` bounds how long a
    /// record survives a crashed owner.
    #[must_use]
    pub fn new(pool: RedisPool, ttl_seconds: u64) -> Self {
        Self { pool, ttl_seconds }
    }

    fn online_key(identity_id: &IdentityId) -> String {
        format!("{ONLINE_KEY_PREFIX}{identity_id}")
    }
}

impl From<RedisPoolError> for PresenceError {
    fn from(err: RedisPoolError) -> Self {
        Self::Store(err.to_string())
    }
}

#[async_trait]
impl PresenceTracker for RedisPresence {
    async fn mark_online(
        &self,
        identity_id: &IdentityId,
        connection_id: &ConnectionId,
        owner: &ProcessId,
    ) -> PresenceResult<()> {
        let key = Self::online_key(identity_id);
        let mut conn = self.pool.get().await.map_err(PresenceError::from)?;

        let write: RedisResult<()> = async {
            conn.hset::<_, _, _, ()>(&key, connection_id.as_str(), owner.as_str())
                .await?;
            conn.expire::<_, ()>(&key, i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX))
                .await?;
            Ok(())
        }
        .await;
        write.map_err(PresenceError::from)?;

        tracing::debug!(
            identity_id = %identity_id,
            connection_id = %connection_id,
            "Presence record created"
        );

        Ok(())
    }

    async fn refresh(&self, identity_id: &IdentityId) -> PresenceResult<()> {
        let key = Self::online_key(identity_id);
        self.pool
            .expire(&key, self.ttl_seconds)
            .await
            .map_err(PresenceError::from)?;
        Ok(())
    }

    async fn mark_offline(
        &self,
        identity_id: &IdentityId,
        connection_id: &ConnectionId,
    ) -> PresenceResult<()> {
        let key = Self::online_key(identity_id);
        let mut conn = self.pool.get().await.map_err(PresenceError::from)?;
        conn.hdel::<_, _, ()>(&key, connection_id.as_str())
            .await
            .map_err(|e| PresenceError::Store(e.to_string()))?;

        tracing::debug!(
            identity_id = %identity_id,
            connection_id = %connection_id,
            "Presence record removed"
        );

        Ok(())
    }

    async fn is_online(&self, identity_id: &IdentityId) -> PresenceResult<bool> {
        let key = Self::online_key(identity_id);
        self.pool.exists(&key).await.map_err(PresenceError::from)
    }

    async fn is_online_batch(&self, identity_ids: &[IdentityId]) -> PresenceResult<Vec<bool>> {
        let mut statuses = Vec::with_capacity(identity_ids.len());
        for identity_id in identity_ids {
            statuses.push(self.is_online(identity_id).await?);
        }
        Ok(statuses)
    }
}
