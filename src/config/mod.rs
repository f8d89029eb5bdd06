// src/config/mod.rs
pub mod settings;

pub use settings::{Config, QueueBackend, StoreBackend};

use crate::error::OrderError;
use std::sync::Arc;

/// Loads `.env` (if present) and the environment into a validated `Config`.
pub fn load_config() -> Result<Arc<Config>, OrderError> {
    load_config_with(|_| {})
}

/// Like [`load_config`], applying `overrides` (e.g. command-line flags)
/// on top of the environment before validation.
pub fn load_config_with<F>(overrides: F) -> Result<Arc<Config>, OrderError>
where
    F: FnOnce(&mut Config),
{
    dotenv::dotenv().ok(); // Load .env file if present, ignore errors

    let mut config = Config::from_env()?;
    overrides(&mut config);
    config.validate()?;

    Ok(Arc::new(config))
}
