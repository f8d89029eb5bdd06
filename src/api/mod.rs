// src/api/mod.rs
//! HTTP surface: order submission, order lookup, live status upgrade, health.

pub mod routes;
pub mod server;

pub use routes::create_router;
pub use server::ApiServer;

use crate::orders::{OrderService, OrderStore};
use crate::websocket::StatusChannelRegistry;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: OrderService,
    pub store: Arc<dyn OrderStore>,
    pub registry: Arc<StatusChannelRegistry>,
}

impl AppState {
    pub fn new(service: OrderService, registry: Arc<StatusChannelRegistry>) -> Self {
        Self {
            store: service.store(),
            service,
            registry,
        }
    }
}
