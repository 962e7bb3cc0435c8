//! Room membership management

mod membership;

pub use membership::{ConnectionRef, RoomMembership};
