//! Environment-driven configuration. Grounded on `aibysid-HyperLiquidMM`'s
//! `std::env::var`-with-fallback style, narrowed to this crate's knobs.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

pub struct Settings {
    pub fiat_currency: String,
    pub max_drawdown: Decimal,
    pub fiat_ratio: Decimal,
    pub poll_interval: Duration,
    pub starting_price: f64,
    pub rate_limit_interval_ms: i64,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            fiat_currency: env_or("MM_FIAT_CURRENCY", "USDT"),
            max_drawdown: env_decimal_or("MM_MAX_DRAWDOWN", Decimal::new(2, 1)),
            fiat_ratio: env_decimal_or("MM_FIAT_RATIO", Decimal::new(5, 1)),
            poll_interval: Duration::from_secs(env_u64_or("MM_POLL_INTERVAL_SECS", 5)),
            starting_price: env_or("MM_STARTING_PRICE", "100").parse().unwrap_or(100.0),
            rate_limit_interval_ms: env_u64_or("MM_RATE_LIMIT_INTERVAL_MS", 200) as i64,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64_or(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_decimal_or(key: &str, default: Decimal) -> Decimal {
    std::env::var(key).ok().and_then(|v| Decimal::from_str(&v).ok()).unwrap_or(default)
}
