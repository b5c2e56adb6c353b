//! Groundwatch event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DetectionNotification`]: published once per persisted detection.

pub mod bus;

pub use bus::{DetectionNotification, EventBus, NEW_DETECTION_EVENT};
