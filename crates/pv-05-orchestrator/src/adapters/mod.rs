//! Adapters layer.

pub mod enqueuer;

pub use enqueuer::QueueVerificationEnqueuer;
