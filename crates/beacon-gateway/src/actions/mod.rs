//! In-process backend action routing

mod router;

pub use router::ActionRouter;
