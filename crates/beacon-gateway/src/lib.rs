//! # beacon-gateway
//!
//! Realtime gateway for a chat backend: terminates long-lived WebSocket
//! connections, authenticates them against the backend identity action,
//! maps them into rooms, relays client actions into the backend action
//! layer, and fans server notifications out to exactly the right sockets -
//! including sockets held by other gateway processes.

pub mod actions;
pub mod admin;
pub mod auth;
pub mod connection;
pub mod dispatch;
pub mod fanout;
pub mod protocol;
pub mod relay;
pub mod rooms;
pub mod server;

pub use server::{create_app, create_gateway_state, run, GatewayState};
