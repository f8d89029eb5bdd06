// src/lib.rs
pub mod api;
pub mod config;
pub mod dex;
pub mod error;
pub mod orders;
pub mod queue;
pub mod routing;
pub mod testing; // Scripted sources for tests and local runs
pub mod utils;
pub mod websocket;

pub use error::{OrderError, Result, RetryPolicy};
pub use orders::{Order, OrderStatus, StatusEvent, SwapRequest};
pub use routing::{DexRouter, ExecutionReceipt};
