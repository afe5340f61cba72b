use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A trading pair `"BASE/QUOTE"` (e.g. `BTC/USDT`).
///
/// `base` is the asset held, `quote` is the accounting currency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
#[display("{base}/{quote}")]
pub struct Market {
    pub base: String,
    pub quote: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketParseError {
    #[error("market symbol {0:?} is missing the '/' separator")]
    MissingSeparator(String),
}

impl Market {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl FromStr for Market {
    type Err = MarketParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| MarketParseError::MissingSeparator(s.to_string()))?;
        Ok(Self::new(base, quote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        let m: Market = "BTC/USDT".parse().unwrap();
        assert_eq!(m.base(), "BTC");
        assert_eq!(m.quote(), "USDT");
        assert_eq!(m.to_string(), "BTC/USDT");
    }

    #[test]
    fn rejects_missing_separator() {
        assert!("BTCUSDT".parse::<Market>().is_err());
    }
}
