//! Generic action relay

mod denylist;
#[allow(clippy::module_inception)]
mod relay;

pub use denylist::Denylist;
pub use relay::ActionRelay;
