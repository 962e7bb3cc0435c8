//! Redis Pub/Sub publisher.
//!
//! Publishes serialized fan-out traffic. The payload shape is owned by the
//! gateway's fan-out adapter; this layer only moves strings.

use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::FanoutChannel;
use redis::AsyncCommands;

/// Redis Pub/Sub publisher
#[derive(Clone)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    /// Create a new publisher
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish a serialized message to a channel, returning the number of
    /// subscribing processes that received it.
    pub async fn publish(&self, channel: &FanoutChannel, payload: &str) -> RedisResult<u32> {
        let mut conn = self.pool.get().await?;
        let channel_name = channel.name();

        let receivers: u32 = conn.publish(&channel_name, payload).await?;

        tracing::trace!(
            channel = %channel_name,
            receivers = receivers,
            "Published fan-out message"
        );

        Ok(receivers)
    }
}
