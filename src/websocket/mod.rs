// src/websocket/mod.rs
//! Live order status delivery: the subscriber registry and the WebSocket
//! handler that feeds it to clients.

pub mod handler;
pub mod registry;

pub use handler::{order_updates, stream_order_updates};
pub use registry::{Delivery, StatusChannelRegistry, SubscriberId, SUBSCRIBER_BUFFER};
