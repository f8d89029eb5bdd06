// src/dex/settlement.rs
//! Simulated swap settlement: builds, submits and confirms against the chosen venue.

use crate::dex::quote::{Quote, SettlementVenue};
use crate::error::{OrderError, Result};
use crate::utils::generate_tx_reference;
use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimulatedSettlement {
    latency: Duration,
    jitter: Duration,
    failure_rate: f64,
}

impl SimulatedSettlement {
    /// `failure_rate` is the probability in [0, 1] that a settlement is rejected.
    pub fn new(latency: Duration, jitter: Duration, failure_rate: f64) -> Self {
        Self {
            latency,
            jitter,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    fn sample_latency(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.latency;
        }
        self.latency + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

#[async_trait]
impl SettlementVenue for SimulatedSettlement {
    async fn settle(
        &self,
        quote: &Quote,
        input_token: &str,
        output_token: &str,
        amount: f64,
    ) -> Result<String> {
        tokio::time::sleep(self.sample_latency()).await;

        if self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate) {
            warn!(
                "Settlement of {} {} -> {} rejected by {}",
                amount, input_token, output_token, quote.venue
            );
            return Err(OrderError::Execution(format!(
                "settlement rejected by {}",
                quote.venue
            )));
        }

        let tx_reference = generate_tx_reference();
        debug!("Settled on {} with {}", quote.venue, tx_reference);
        Ok(tx_reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settlement_returns_fresh_reference() {
        let settlement = SimulatedSettlement::new(Duration::ZERO, Duration::ZERO, 0.0);
        let quote = Quote::new("Raydium", 101.5, 0.003);
        let a = settlement.settle(&quote, "SOL", "USDC", 10.0).await.unwrap();
        let b = settlement.settle(&quote, "SOL", "USDC", 10.0).await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("tx_"));
    }

    #[tokio::test]
    async fn test_settlement_always_rejects_at_full_failure_rate() {
        let settlement = SimulatedSettlement::new(Duration::ZERO, Duration::ZERO, 1.0);
        let quote = Quote::new("Meteora", 99.2, 0.002);
        let err = settlement.settle(&quote, "SOL", "USDC", 10.0).await.unwrap_err();
        assert!(matches!(err, OrderError::Execution(_)));
    }
}
