//! Value objects - validated identifier newtypes

mod ids;
mod room_key;

pub use ids::{ConnectionId, IdentityId, ProcessId};
pub use room_key::{RoomKey, RoomKeyError};
