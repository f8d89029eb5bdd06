// src/dex/mod.rs

pub mod clients;
pub mod quote;
pub mod settlement;

pub use quote::{Quote, QuoteSource, SettlementVenue};
pub use settlement::SimulatedSettlement;

use crate::config::settings::Config;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Builds the configured quote sources in routing priority order.
/// On an exact price tie the earlier source wins.
pub fn get_all_sources(app_config: &Config) -> Vec<Arc<dyn QuoteSource>> {
    let latency = Duration::from_millis(app_config.quote_latency_ms);
    let sources: Vec<Arc<dyn QuoteSource>> = vec![
        Arc::new(clients::RaydiumClient::new(app_config.base_price, latency)),
        Arc::new(clients::MeteoraClient::new(app_config.base_price, latency)),
    ];
    info!(
        "Initialized {} quote sources: {:?}",
        sources.len(),
        sources.iter().map(|s| s.name()).collect::<Vec<&str>>()
    );
    sources
}

pub fn get_settlement(app_config: &Config) -> Arc<dyn SettlementVenue> {
    Arc::new(SimulatedSettlement::new(
        Duration::from_millis(app_config.settlement_latency_ms),
        Duration::from_millis(app_config.settlement_jitter_ms),
        app_config.settlement_failure_rate,
    ))
}
