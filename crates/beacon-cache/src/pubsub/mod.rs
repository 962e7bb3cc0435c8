//! Redis pub/sub plumbing for the clustered fan-out adapter

mod channels;
mod publisher;
mod subscriber;

pub use channels::{FanoutChannel, DELIVERY_CHANNEL, MEMBERSHIP_CHANNEL};
pub use publisher::Publisher;
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig, SubscriberError,
    SubscriberResult,
};
