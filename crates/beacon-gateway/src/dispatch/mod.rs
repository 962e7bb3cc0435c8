//! Multicast dispatch

mod multicast;

pub use multicast::{scoped_event, Multicast, MulticastDispatcher, NotifyRequest};
