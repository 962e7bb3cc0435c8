//! Online registry implementations
//!
//! Both stores implement `beacon_core::PresenceTracker`. The Redis store is
//! the clustered-mode implementation; the memory store serves single-process
//! deployments and tests.

mod memory;
mod redis_presence;

pub use memory::MemoryPresence;
pub use redis_presence::{RedisPresence, ONLINE_KEY_PREFIX};
