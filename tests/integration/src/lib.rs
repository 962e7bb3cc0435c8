//! Integration test utilities for the beacon gateway
//!
//! Boots a real gateway (local fan-out, in-memory presence) on an ephemeral
//! port with a scripted backend router, and drives it with a plain
//! WebSocket client.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
