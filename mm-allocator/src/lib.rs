//! Trading-universe selection: filters candidate markets down to the ones
//! an agent may trade, and derives the trend/price-level settings a
//! [`mm-strategy::TradingAgent`] needs to seed a newly eligible market.
//! Grounded on the legacy `src/portfolio/allocator.rs` `OrderAllocator`
//! filter-then-size idiom, generalized from per-order sizing to
//! per-market universe selection.

use mm_instrument::{Candle, Market, Ticker};
use mm_quant::compute_gbm_parameters;
use mm_ta::{ema, rsi, tail, vdx};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::debug;

/// Everything known about a candidate market before allocation runs.
pub struct MarketCandidate {
    pub ticker: Ticker,
    /// At least the last `24*7` 1h candles; fewer disqualifies the market.
    pub hourly_candles: Vec<Candle>,
    /// At least the last 30 1d candles; fewer disqualifies the market.
    pub daily_candles: Vec<Candle>,
}

#[derive(Debug, Clone)]
pub struct AllocatorOptions {
    pub minimum_volume: Decimal,
    pub minimum_fiat_price: Decimal,
    pub max_percentage_hours_no_volume: Decimal,
    pub minimum_average_volume: Decimal,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self {
            minimum_volume: dec!(70),
            minimum_fiat_price: Decimal::ZERO,
            max_percentage_hours_no_volume: dec!(0.1),
            minimum_average_volume: Decimal::ZERO,
        }
    }
}

const HOURLY_WINDOW: usize = 24 * 7;
const DAILY_WINDOW: usize = 30;
const QUOTE_VOLUME_EMA_PERIOD: usize = 5;

/// Persisted per-market result of a universe run, analogous to
/// `strategyOptions.marketSettings` in the operator-facing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub market: Market,
    pub can_trade: bool,
    pub trend: Decimal,
    pub price_level: Decimal,
}

pub struct PortfolioAllocator {
    pub options: AllocatorOptions,
}

impl PortfolioAllocator {
    pub fn new(options: AllocatorOptions) -> Self {
        Self { options }
    }

    /// Evaluates every candidate against the universe filter chain.
    /// Markets that fail any filter are reported with `can_trade: false`
    /// and zeroed trend/price-level; callers decide whether an
    /// already-active market stays active despite failing here.
    pub fn select_markets(&self, universe: &HashMap<Market, MarketCandidate>) -> Vec<MarketSettings> {
        universe
            .iter()
            .map(|(market, candidate)| self.evaluate(market, candidate))
            .collect()
    }

    fn evaluate(&self, market: &Market, candidate: &MarketCandidate) -> MarketSettings {
        if !self.passes_filters(market, candidate) {
            return MarketSettings {
                market: market.clone(),
                can_trade: false,
                trend: Decimal::ZERO,
                price_level: Decimal::ONE,
            };
        }

        let trend = tail(&vdx(&candidate.daily_candles, 30)).unwrap_or(Decimal::ZERO);
        let price_level = tail(&rsi(&candidate.daily_candles, 20)).unwrap_or(Decimal::ZERO) / Decimal::from(100);

        MarketSettings {
            market: market.clone(),
            can_trade: true,
            trend,
            price_level,
        }
    }

    fn passes_filters(&self, market: &Market, candidate: &MarketCandidate) -> bool {
        if candidate.ticker.base_volume < self.options.minimum_volume {
            debug!(%market, "rejected: dayVolume below minimumVolume");
            return false;
        }
        if candidate.ticker.last < self.options.minimum_fiat_price {
            debug!(%market, "rejected: last below minimumFiatPrice");
            return false;
        }

        if candidate.hourly_candles.len() < HOURLY_WINDOW {
            debug!(%market, "rejected: fewer than 24*7 1h candles");
            return false;
        }
        let window = &candidate.hourly_candles[candidate.hourly_candles.len() - HOURLY_WINDOW..];
        let zero_volume = window.iter().filter(|c| c.volume.is_zero()).count();
        let zero_fraction = Decimal::from(zero_volume as u64) / Decimal::from(HOURLY_WINDOW as u64);
        if zero_fraction > self.options.max_percentage_hours_no_volume {
            debug!(%market, %zero_fraction, "rejected: too many zero-volume hours");
            return false;
        }

        if compute_gbm_parameters(&candidate.hourly_candles).is_err() {
            debug!(%market, "rejected: GBM parameters could not be computed");
            return false;
        }

        if candidate.daily_candles.len() < DAILY_WINDOW {
            debug!(%market, "rejected: fewer than 30 1d candles");
            return false;
        }

        let quote_volumes: Vec<Decimal> = candidate
            .daily_candles
            .iter()
            .map(Candle::quote_volume_estimate)
            .collect();
        let average_volume = tail(&ema(&quote_volumes, QUOTE_VOLUME_EMA_PERIOD)).unwrap_or(Decimal::ZERO);
        if average_volume < self.options.minimum_average_volume {
            debug!(%market, %average_volume, "rejected: EMA(5) quoteVolumeEstimate below minimumAverageVolume");
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(base_volume: Decimal, last: Decimal) -> Ticker {
        Ticker::new(0, last - dec!(0.5), last + dec!(0.5), last, base_volume, base_volume * last)
    }

    fn active_hourly_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64 * 3_600_000, dec!(100), dec!(101), dec!(99), dec!(100), dec!(5)))
            .collect()
    }

    fn active_daily_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64 * 86_400_000, dec!(100), dec!(105), dec!(95), dec!(100), dec!(1000)))
            .collect()
    }

    #[test]
    fn low_volume_market_is_rejected() {
        let allocator = PortfolioAllocator::new(AllocatorOptions::default());
        let market = Market::new("ABC", "USDT");
        let candidate = MarketCandidate {
            ticker: ticker(dec!(1), dec!(10)),
            hourly_candles: active_hourly_candles(24 * 7),
            daily_candles: active_daily_candles(30),
        };
        let settings = allocator.evaluate(&market, &candidate);
        assert!(!settings.can_trade);
    }

    #[test]
    fn insufficient_candle_history_is_rejected() {
        let allocator = PortfolioAllocator::new(AllocatorOptions::default());
        let market = Market::new("BTC", "USDT");
        let candidate = MarketCandidate {
            ticker: ticker(dec!(1000), dec!(100)),
            hourly_candles: active_hourly_candles(10),
            daily_candles: active_daily_candles(30),
        };
        assert!(!allocator.evaluate(&market, &candidate).can_trade);
    }

    #[test]
    fn healthy_market_survives_and_gets_trend_and_price_level() {
        let allocator = PortfolioAllocator::new(AllocatorOptions::default());
        let market = Market::new("BTC", "USDT");
        let candidate = MarketCandidate {
            ticker: ticker(dec!(1000), dec!(100)),
            hourly_candles: active_hourly_candles(24 * 7),
            daily_candles: active_daily_candles(30),
        };
        let settings = allocator.evaluate(&market, &candidate);
        assert!(settings.can_trade);
    }

    #[test]
    fn too_many_zero_volume_hours_is_rejected() {
        let allocator = PortfolioAllocator::new(AllocatorOptions::default());
        let market = Market::new("BTC", "USDT");
        let mut hourly = active_hourly_candles(24 * 7);
        for candle in hourly.iter_mut().take(20) {
            candle.volume = Decimal::ZERO;
        }
        let candidate = MarketCandidate {
            ticker: ticker(dec!(1000), dec!(100)),
            hourly_candles: hourly,
            daily_candles: active_daily_candles(30),
        };
        assert!(!allocator.evaluate(&market, &candidate).can_trade);
    }
}
