// src/testing/mod.rs
//! Deterministic quote sources and settlement for tests and local demos.
//!
//! Scripted sources return a fixed price, can fail a set number of calls
//! before succeeding, and count how often they were asked.

use crate::dex::quote::{Quote, QuoteSource, SettlementVenue};
use crate::error::{OrderError, Result};
use crate::utils::generate_tx_reference;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Erases scripted sources into the router's source list, keeping order.
pub fn as_sources(sources: Vec<Arc<ScriptedQuoteSource>>) -> Vec<Arc<dyn QuoteSource>> {
    sources
        .into_iter()
        .map(|source| source as Arc<dyn QuoteSource>)
        .collect()
}

#[derive(Debug)]
pub struct ScriptedQuoteSource {
    name: String,
    price: f64,
    fee: f64,
    /// Calls that fail before the source starts answering; `u32::MAX` never answers.
    fail_first: u32,
    latency: Duration,
    calls: AtomicU32,
}

impl ScriptedQuoteSource {
    pub fn fixed(name: &str, price: f64, fee: f64) -> Self {
        Self::failing_first(name, price, fee, 0)
    }

    pub fn failing_first(name: &str, price: f64, fee: f64, failures: u32) -> Self {
        Self {
            name: name.to_string(),
            price,
            fee,
            fail_first: failures,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_failing(name: &str) -> Self {
        Self::failing_first(name, 100.0, 0.003, u32::MAX)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_quote(&self, _input_token: &str, _output_token: &str, _amount: f64) -> Result<Quote> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if call < self.fail_first {
            return Err(OrderError::Quoting(format!("{} unavailable (call {})", self.name, call + 1)));
        }
        Ok(Quote::new(self.name.clone(), self.price, self.fee))
    }
}

#[derive(Debug)]
pub struct ScriptedSettlement {
    reject_first: u32,
    latency: Duration,
    calls: AtomicU32,
}

impl ScriptedSettlement {
    pub fn succeeding() -> Self {
        Self::rejecting_first(0)
    }

    pub fn rejecting() -> Self {
        Self::rejecting_first(u32::MAX)
    }

    pub fn rejecting_first(rejections: u32) -> Self {
        Self {
            reject_first: rejections,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementVenue for ScriptedSettlement {
    async fn settle(&self, quote: &Quote, _input_token: &str, _output_token: &str, _amount: f64) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if call < self.reject_first {
            return Err(OrderError::Execution(format!("settlement rejected by {}", quote.venue)));
        }
        Ok(generate_tx_reference())
    }
}
