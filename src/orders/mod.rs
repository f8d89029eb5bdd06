// src/orders/mod.rs
//! Order records, their lifecycle, and persistence.

pub mod order;
pub mod postgres;
pub mod service;
pub mod store;

pub use order::{Order, OrderStatus, StatusEvent, SwapRequest, Transition};
pub use postgres::PostgresOrderStore;
pub use service::OrderService;
pub use store::{InMemoryOrderStore, OrderStore};
