// src/dex/clients/meteora.rs
//! Meteora quote source: wider 3–5% price variance, lower 0.2% fee.

use super::SimulatedMarket;
use crate::dex::quote::{Quote, QuoteSource};
use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

pub const METEORA_FEE: f64 = 0.002;

#[derive(Debug, Clone)]
pub struct MeteoraClient {
    market: SimulatedMarket,
}

impl MeteoraClient {
    pub fn new(base_price: f64, latency: Duration) -> Self {
        Self {
            market: SimulatedMarket {
                base_price,
                price_floor: 0.97,
                price_width: 0.05,
                fee: METEORA_FEE,
                latency,
            },
        }
    }
}

#[async_trait]
impl QuoteSource for MeteoraClient {
    fn name(&self) -> &str {
        "Meteora"
    }

    async fn get_quote(&self, input_token: &str, output_token: &str, amount: f64) -> Result<Quote> {
        debug!("Meteora quoting {} {} -> {}", amount, input_token, output_token);
        tokio::time::sleep(self.market.latency).await;
        Ok(Quote::new(self.name(), self.market.sample_price(), self.market.fee))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_meteora_quote_within_band() {
        let client = MeteoraClient::new(100.0, Duration::ZERO);
        for _ in 0..50 {
            let quote = client.get_quote("SOL", "USDC", 10.0).await.unwrap();
            assert_eq!(quote.venue, "Meteora");
            assert!(quote.price >= 97.0 && quote.price <= 102.0, "price {}", quote.price);
            assert_eq!(quote.fee, METEORA_FEE);
        }
    }
}
