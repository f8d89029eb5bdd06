// src/utils/mod.rs
use log::info;
use rand::Rng;
use std::str::FromStr;

/// Fractional digits kept on an executed price.
pub const PRICE_DECIMALS: i32 = 6;

pub fn setup_logging(level: &str) -> Result<(), fern::InitError> {
    let level = log::LevelFilter::from_str(level).unwrap_or(log::LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("sqlx", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("tower_http", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at level {}.", level);
    Ok(())
}

/// Rounds `value` to `decimals` fractional digits.
pub fn round_to_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Opaque settlement reference: `tx_` followed by 32 random hex characters.
pub fn generate_tx_reference() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    format!("tx_{}", hex::encode(bytes))
}
