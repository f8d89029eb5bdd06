// src/routing/dex_router.rs
//! Best-quote routing across all configured quote sources.
//!
//! Every source is quoted concurrently and every quote must arrive: a single
//! failure or timeout fails the whole routing attempt. The highest price wins;
//! on an exact tie the source configured first wins.

use crate::dex::quote::{Quote, QuoteSource, SettlementVenue};
use crate::error::{OrderError, Result};
use crate::utils::{round_to_decimals, PRICE_DECIMALS};
use futures::future::join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of quote collection and venue selection.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub selected: Quote,
    /// Every quote considered, in source configuration order.
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub venue: String,
    /// Rounded to 6 fractional digits.
    pub executed_price: f64,
    pub tx_reference: String,
}

/// Stateless per request; one instance is shared by every worker.
pub struct DexRouter {
    sources: Vec<Arc<dyn QuoteSource>>,
    settlement: Arc<dyn SettlementVenue>,
    quote_timeout: Duration,
    settlement_timeout: Duration,
}

impl DexRouter {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>, settlement: Arc<dyn SettlementVenue>) -> Self {
        Self {
            sources,
            settlement,
            quote_timeout: DEFAULT_QUOTE_TIMEOUT,
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, quote_timeout: Duration, settlement_timeout: Duration) -> Self {
        self.quote_timeout = quote_timeout;
        self.settlement_timeout = settlement_timeout;
        self
    }

    /// Quotes every source, selects the best venue, then settles against it.
    pub async fn execute_best_swap(
        &self,
        input_token: &str,
        output_token: &str,
        amount: f64,
    ) -> Result<ExecutionReceipt> {
        let decision = self.route(input_token, output_token, amount).await?;
        self.settle(&decision, input_token, output_token, amount).await
    }

    /// Validates the request, collects all quotes and picks the winning venue.
    pub async fn route(&self, input_token: &str, output_token: &str, amount: f64) -> Result<RoutingDecision> {
        validate_swap(input_token, output_token, amount)?;

        let quotes = self.fetch_quotes(input_token, output_token, amount).await?;
        let selected = select_best_quote(&quotes)
            .cloned()
            .ok_or_else(|| OrderError::Quoting("no quote sources configured".to_string()))?;

        info!("[DEX ROUTER] {} {} -> {}", amount, input_token, output_token);
        for quote in &quotes {
            info!("[Quote] {}: {:.4} (fee {:.4})", quote.venue, quote.price, quote.fee);
        }
        info!("[Routing Decision] Selected: {} @ {:.4}", selected.venue, selected.price);

        Ok(RoutingDecision { selected, quotes })
    }

    /// Settles a routing decision, bounded by the settlement timeout.
    pub async fn settle(
        &self,
        decision: &RoutingDecision,
        input_token: &str,
        output_token: &str,
        amount: f64,
    ) -> Result<ExecutionReceipt> {
        let quote = &decision.selected;
        let tx_reference = match timeout(
            self.settlement_timeout,
            self.settlement.settle(quote, input_token, output_token, amount),
        )
        .await
        {
            Ok(Ok(tx)) => tx,
            Ok(Err(OrderError::Execution(msg))) => return Err(OrderError::Execution(msg)),
            Ok(Err(other)) => {
                return Err(OrderError::Execution(format!(
                    "settlement on {} failed: {}",
                    quote.venue, other
                )))
            }
            Err(_) => {
                return Err(OrderError::Execution(format!(
                    "settlement on {} timed out after {:?}",
                    quote.venue, self.settlement_timeout
                )))
            }
        };

        Ok(ExecutionReceipt {
            venue: quote.venue.clone(),
            executed_price: round_to_decimals(quote.price, PRICE_DECIMALS),
            tx_reference,
        })
    }

    async fn fetch_quotes(&self, input_token: &str, output_token: &str, amount: f64) -> Result<Vec<Quote>> {
        let quote_timeout = self.quote_timeout;
        let futures = self.sources.iter().map(|source| async move {
            let name = source.name().to_string();
            let quote = match timeout(quote_timeout, source.get_quote(input_token, output_token, amount)).await {
                Ok(Ok(quote)) => quote,
                Ok(Err(e)) => {
                    return Err(OrderError::Quoting(format!("{} quote failed: {}", name, e)))
                }
                Err(_) => {
                    return Err(OrderError::Quoting(format!(
                        "{} quote timed out after {:?}",
                        name, quote_timeout
                    )))
                }
            };
            quote.validate()?;
            debug!("Received quote from {}: {:?}", name, quote);
            Ok::<Quote, OrderError>(quote)
        });

        // Wait for every source so one failure never cuts another short mid-request.
        join_all(futures).await.into_iter().collect()
    }
}

/// Fails fast on an empty token symbol or a non-positive amount.
pub fn validate_swap(input_token: &str, output_token: &str, amount: f64) -> Result<()> {
    if input_token.trim().is_empty() || output_token.trim().is_empty() {
        return Err(OrderError::Validation(
            "inputToken and outputToken must be non-empty".to_string(),
        ));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(OrderError::Validation(format!(
            "amount must be a positive number, got {}",
            amount
        )));
    }
    Ok(())
}

/// Highest price wins; only a strictly higher price displaces an earlier quote.
pub fn select_best_quote(quotes: &[Quote]) -> Option<&Quote> {
    quotes.iter().fold(None, |best: Option<&Quote>, quote| match best {
        Some(current) if quote.price <= current.price => Some(current),
        _ => Some(quote),
    })
}
