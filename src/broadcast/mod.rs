//! Live update broadcasting.
//!
//! Provides:
//! - The JSON message types pushed to clients
//! - A dynamic observer set with per-observer failure isolation

pub mod hub;
pub mod message;

pub use hub::{Broadcaster, ObserverId, OBSERVER_BUFFER};
pub use message::LiveMessage;
