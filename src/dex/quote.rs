// src/dex/quote.rs

use crate::error::{OrderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A venue's price for one routing decision. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub venue: String,
    /// Output tokens per input token.
    pub price: f64,
    /// Fee as a fraction in [0, 1).
    pub fee: f64,
}

impl Quote {
    pub fn new(venue: impl Into<String>, price: f64, fee: f64) -> Self {
        Self {
            venue: venue.into(),
            price,
            fee,
        }
    }

    /// Rejects quotes with a non-positive price or a fee outside [0, 1).
    pub fn validate(&self) -> Result<()> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(OrderError::Quoting(format!(
                "{} returned a non-positive price: {}",
                self.venue, self.price
            )));
        }
        if !(0.0..1.0).contains(&self.fee) {
            return Err(OrderError::Quoting(format!(
                "{} returned a fee outside [0, 1): {}",
                self.venue, self.fee
            )));
        }
        Ok(())
    }
}

/// A price source for a trading pair. Implementations must be side-effect free
/// and safe to call concurrently.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Venue name reported on quotes and receipts (e.g., "Raydium").
    fn name(&self) -> &str;

    async fn get_quote(&self, input_token: &str, output_token: &str, amount: f64) -> Result<Quote>;
}

/// Settles a swap against the venue that won routing and returns its transaction reference.
#[async_trait]
pub trait SettlementVenue: Send + Sync {
    async fn settle(
        &self,
        quote: &Quote,
        input_token: &str,
        output_token: &str,
        amount: f64,
    ) -> Result<String>;
}
