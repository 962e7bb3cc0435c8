//! # beacon-cache
//!
//! Redis layer for the gateway: the TTL-backed online registry behind the
//! presence tracker, and the pub/sub plumbing behind the clustered fan-out
//! adapter. An in-memory presence store is included for single-process
//! deployments that run without Redis.

pub mod pool;
pub mod presence;
pub mod pubsub;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export presence stores
pub use presence::{MemoryPresence, RedisPresence, ONLINE_KEY_PREFIX};

// Re-export pubsub types
pub use pubsub::{
    FanoutChannel, Publisher, ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig,
    SubscriberError, SubscriberResult, DELIVERY_CHANNEL, MEMBERSHIP_CHANNEL,
};
