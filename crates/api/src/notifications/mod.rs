//! Delivery of detection notifications to WebSocket clients.

mod relay;

pub use relay::NotificationRelay;
