// src/dex/clients/mod.rs
//! Quote source implementations for the supported venues.
//! Prices are simulated around a configurable base price with a per-venue spread.

pub mod meteora;
pub mod raydium;

pub use meteora::MeteoraClient;
pub use raydium::RaydiumClient;

use rand::Rng;
use std::time::Duration;

/// Spread and latency profile of a simulated venue.
#[derive(Debug, Clone)]
pub struct SimulatedMarket {
    pub base_price: f64,
    /// Lowest multiplier applied to the base price.
    pub price_floor: f64,
    /// Width of the uniform multiplier range above the floor.
    pub price_width: f64,
    pub fee: f64,
    pub latency: Duration,
}

impl SimulatedMarket {
    pub fn sample_price(&self) -> f64 {
        let jitter: f64 = rand::thread_rng().gen();
        self.base_price * (self.price_floor + jitter * self.price_width)
    }
}
