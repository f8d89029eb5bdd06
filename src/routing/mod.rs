// src/routing/mod.rs
pub mod dex_router;

pub use dex_router::{
    select_best_quote, validate_swap, DexRouter, ExecutionReceipt, RoutingDecision,
};
