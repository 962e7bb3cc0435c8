//! Gateway wire protocol
//!
//! JSON text frames with camelCase keys. Clients send action frames; the
//! gateway answers with reply frames (only when an `ackId` was supplied)
//! and pushes unsolicited event frames for multicast deliveries.

mod close_codes;
mod frames;

pub use close_codes::CloseCode;
pub use frames::{ActionFrame, OutboundFrame, PushFrame, ReplyEnvelope, ReplyFrame};
