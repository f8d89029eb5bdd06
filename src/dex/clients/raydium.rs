// src/dex/clients/raydium.rs
//! Raydium quote source. Prices land within 2–4% variance of the base price, 0.3% fee.

use super::SimulatedMarket;
use crate::dex::quote::{Quote, QuoteSource};
use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

pub const RAYDIUM_FEE: f64 = 0.003;

#[derive(Debug, Clone)]
pub struct RaydiumClient {
    market: SimulatedMarket,
}

impl RaydiumClient {
    pub fn new(base_price: f64, latency: Duration) -> Self {
        Self {
            market: SimulatedMarket {
                base_price,
                price_floor: 0.98,
                price_width: 0.04,
                fee: RAYDIUM_FEE,
                latency,
            },
        }
    }
}

#[async_trait]
impl QuoteSource for RaydiumClient {
    fn name(&self) -> &str {
        "Raydium"
    }

    async fn get_quote(&self, input_token: &str, output_token: &str, amount: f64) -> Result<Quote> {
        debug!("Raydium quoting {} {} -> {}", amount, input_token, output_token);
        tokio::time::sleep(self.market.latency).await;
        Ok(Quote::new(self.name(), self.market.sample_price(), self.market.fee))
    }
}
