//! Per-market two-sided quoting: inventory skew, risk-aversion correction
//! and cool-off. Grounded on `jackbot-execution/src/market_making/mod.rs`'s
//! `Quote`/cool-off helpers and its `FlowToxicityDetector`/`QuoteRefresher`,
//! driven by the `mm-quant` Guéant layer upstream.

use mm_exchange::Trade;
use mm_instrument::{Order, Side, Ticker};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Flags one-sided trade flow as toxic: requoting into it tends to get
/// adversely selected, so the caller should sit out the tick instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowToxicityDetector {
    pub threshold: Decimal,
}

impl FlowToxicityDetector {
    pub fn is_toxic(&self, trades: &[Trade]) -> bool {
        let (buy, sell) = trades.iter().fold((Decimal::ZERO, Decimal::ZERO), |acc, t| match t.side {
            Side::Buy => (acc.0 + t.amount, acc.1),
            Side::Sell => (acc.0, acc.1 + t.amount),
        });
        let total = buy + sell;
        if total.is_zero() {
            return false;
        }
        let dominant = buy.max(sell);
        dominant / total > self.threshold
    }
}

/// Rate-limits how often a new quote is actually placed, independent of the
/// cool-off gating keyed off the last closed order's price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteRefresher {
    pub refresh_interval_ms: i64,
}

impl QuoteRefresher {
    pub fn needs_refresh(&self, last_refresh: Option<i64>, now: i64) -> bool {
        match last_refresh {
            Some(last) => now - last >= self.refresh_interval_ms,
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketMakerOptions {
    pub sigma: Decimal,
    pub mu: Decimal,
    pub inventory_steps: u32,
    pub spread_fixed_term: Decimal,
    pub spread_sigma_multiplier: Decimal,
    pub risk_aversion_correction: Decimal,
    pub min_deal_amount: Decimal,
    pub minimum_notional_value: Decimal,
    pub min_next_quote_difference: Decimal,
    pub dynamic_amount_dropoff: Decimal,
    pub ema_period_slow: usize,
    pub trading_range_sigma_multiplier: Decimal,
    pub trade_volume_cap: Decimal,
    pub cool_off_period: String,
    /// `Decimal::ZERO` disables flow-toxicity gating entirely.
    pub flow_toxicity_threshold: Decimal,
    pub quote_refresh_interval_ms: i64,
}

impl Default for MarketMakerOptions {
    fn default() -> Self {
        Self {
            sigma: dec!(0.05),
            mu: Decimal::ZERO,
            inventory_steps: 8,
            spread_fixed_term: dec!(0.005),
            spread_sigma_multiplier: dec!(0.1),
            risk_aversion_correction: dec!(0.1),
            min_deal_amount: dec!(1),
            minimum_notional_value: Decimal::ZERO,
            min_next_quote_difference: dec!(0.005),
            dynamic_amount_dropoff: dec!(20),
            ema_period_slow: 20,
            trading_range_sigma_multiplier: dec!(1),
            trade_volume_cap: dec!(0.01),
            cool_off_period: "2h".to_string(),
            flow_toxicity_threshold: dec!(0.85),
            quote_refresh_interval_ms: 30_000,
        }
    }
}

pub struct MarketMakerInputs {
    pub ticker: Ticker,
    pub ema_slow: Decimal,
    pub base_balance_total: Decimal,
    pub base_balance_free: Decimal,
    pub quote_balance_free: Decimal,
    pub target_balance: Decimal,
    pub now: i64,
    pub last_closed_sell: Option<Order>,
    pub last_closed_buy: Option<Order>,
    pub has_open_buy: bool,
    pub has_open_sell: bool,
    pub recent_trades: Vec<Trade>,
    pub last_quote_refresh: Option<i64>,
}

fn exp_approx(x: Decimal) -> Decimal {
    x.exp()
}

fn ln_approx(x: Decimal) -> Decimal {
    x.ln()
}

/// The bid/ask price and size the mirror should be quoting right now, or
/// `None` if both sides are already open and nothing needs to change.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredQuote {
    pub can_buy: bool,
    pub can_sell: bool,
    pub bid: Decimal,
    pub ask: Decimal,
    pub buy_amount: Decimal,
    pub sell_amount: Decimal,
}

pub fn quote_market(inputs: &MarketMakerInputs, opts: &MarketMakerOptions, now_ms: i64) -> Option<DesiredQuote> {
    if inputs.has_open_buy && inputs.has_open_sell {
        return None;
    }

    if !opts.flow_toxicity_threshold.is_zero() {
        let detector = FlowToxicityDetector { threshold: opts.flow_toxicity_threshold };
        if detector.is_toxic(&inputs.recent_trades) {
            return None;
        }
    }

    let mid = inputs.ticker.average();
    let balance_offset = inputs.base_balance_total - inputs.target_balance;
    let offset = if inputs.target_balance.is_zero() {
        Decimal::ZERO
    } else {
        balance_offset / inputs.target_balance
    };

    let s = opts.spread_fixed_term + opts.spread_sigma_multiplier * opts.sigma;
    let mut bid = mid - (mid * s * (Decimal::ONE + offset)) / dec!(2);
    let mut ask = mid + (mid * s * (Decimal::ONE - offset)) / dec!(2);

    let rac = exp_approx(ln_approx(dec!(2)) * offset.abs()) * opts.risk_aversion_correction * opts.sigma;
    if offset > Decimal::ZERO {
        bid *= Decimal::ONE - rac;
    } else {
        ask *= Decimal::ONE + rac;
    }

    if let Some(last_sell) = &inputs.last_closed_sell {
        if within_cool_off(last_sell.timestamp_closed, inputs.now, &opts.cool_off_period) {
            let cap = last_sell.price * (Decimal::ONE - opts.min_next_quote_difference);
            bid = bid.min(cap);
        }
    }
    if let Some(last_buy) = &inputs.last_closed_buy {
        if within_cool_off(last_buy.timestamp_closed, inputs.now, &opts.cool_off_period) {
            let floor = last_buy.price * (Decimal::ONE + opts.min_next_quote_difference);
            ask = ask.max(floor);
        }
    }

    let deal = (inputs.target_balance / Decimal::from(opts.inventory_steps.max(1)))
        .min(opts.trade_volume_cap * inputs.ticker.base_volume);

    let price_level = if inputs.ema_slow.is_zero() {
        Decimal::ZERO
    } else {
        mid / inputs.ema_slow - Decimal::ONE
    };
    let buy_amount_dyn = if price_level > Decimal::ZERO {
        deal * exp_approx(-price_level * opts.dynamic_amount_dropoff)
    } else {
        deal
    };
    let sell_amount_dyn = if price_level < Decimal::ZERO {
        deal * exp_approx(price_level * opts.dynamic_amount_dropoff)
    } else {
        deal
    };

    let buy_floor = opts.min_deal_amount.max(if bid.is_zero() {
        Decimal::ZERO
    } else {
        opts.minimum_notional_value / bid
    });
    let sell_floor = opts.min_deal_amount.max(if ask.is_zero() {
        Decimal::ZERO
    } else {
        opts.minimum_notional_value / ask
    });

    let buy_amount = buy_amount_dyn.min(if bid.is_zero() {
        Decimal::ZERO
    } else {
        inputs.quote_balance_free / bid
    });
    let sell_amount = sell_amount_dyn.min(inputs.base_balance_free);

    let can_buy = buy_amount >= buy_floor;
    let can_sell = sell_amount >= sell_floor;

    let mismatch = (can_buy != inputs.has_open_buy) || (can_sell != inputs.has_open_sell);
    if !mismatch {
        return None;
    }

    let refresher = QuoteRefresher { refresh_interval_ms: opts.quote_refresh_interval_ms };
    if !refresher.needs_refresh(inputs.last_quote_refresh, now_ms) {
        return None;
    }

    Some(DesiredQuote {
        can_buy,
        can_sell,
        bid,
        ask,
        buy_amount,
        sell_amount,
    })
}

fn within_cool_off(closed_at: Option<i64>, now: i64, period: &str) -> bool {
    match closed_at {
        Some(t) => {
            let window = mm_core::period_to_ms(period).unwrap_or(7_200_000) as i64;
            now - t < window
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker() -> Ticker {
        Ticker::new(0, dec!(99.5), dec!(100.5), dec!(100), dec!(1000), dec!(100_000))
    }

    #[test]
    fn both_sides_open_is_a_no_op() {
        let inputs = MarketMakerInputs {
            ticker: ticker(),
            ema_slow: dec!(100),
            base_balance_total: dec!(10),
            base_balance_free: dec!(10),
            quote_balance_free: dec!(1000),
            target_balance: dec!(10),
            now: 0,
            last_closed_sell: None,
            last_closed_buy: None,
            has_open_buy: true,
            has_open_sell: true,
            recent_trades: Vec::new(),
            last_quote_refresh: None,
        };
        assert_eq!(quote_market(&inputs, &MarketMakerOptions::default(), 0), None);
    }

    #[test]
    fn overweight_inventory_skews_bid_down() {
        let base = MarketMakerInputs {
            ticker: ticker(),
            ema_slow: dec!(100),
            base_balance_total: dec!(10),
            base_balance_free: dec!(10),
            quote_balance_free: dec!(1000),
            target_balance: dec!(10),
            now: 0,
            last_closed_sell: None,
            last_closed_buy: None,
            has_open_buy: false,
            has_open_sell: false,
            recent_trades: Vec::new(),
            last_quote_refresh: None,
        };
        let balanced = quote_market(&base, &MarketMakerOptions::default(), 0).unwrap();

        let overweight = MarketMakerInputs {
            base_balance_total: dec!(20),
            ..base
        };
        let skewed = quote_market(&overweight, &MarketMakerOptions::default(), 0).unwrap();
        assert!(skewed.bid < balanced.bid);
    }

    #[test]
    fn toxic_flow_suppresses_requoting() {
        let base = MarketMakerInputs {
            ticker: ticker(),
            ema_slow: dec!(100),
            base_balance_total: dec!(10),
            base_balance_free: dec!(10),
            quote_balance_free: dec!(1000),
            target_balance: dec!(10),
            now: 0,
            last_closed_sell: None,
            last_closed_buy: None,
            has_open_buy: false,
            has_open_sell: false,
            recent_trades: vec![
                Trade { timestamp: 0, side: Side::Buy, price: dec!(100), amount: dec!(9) },
                Trade { timestamp: 0, side: Side::Sell, price: dec!(100), amount: dec!(1) },
            ],
            last_quote_refresh: None,
        };
        assert!(quote_market(&base, &MarketMakerOptions::default(), 0).is_none());
    }

    #[test]
    fn quote_refresher_suppresses_requoting_before_interval_elapses() {
        let base = MarketMakerInputs {
            ticker: ticker(),
            ema_slow: dec!(100),
            base_balance_total: dec!(10),
            base_balance_free: dec!(10),
            quote_balance_free: dec!(1000),
            target_balance: dec!(10),
            now: 0,
            last_closed_sell: None,
            last_closed_buy: None,
            has_open_buy: false,
            has_open_sell: false,
            recent_trades: Vec::new(),
            last_quote_refresh: Some(0),
        };
        let opts = MarketMakerOptions::default();
        assert!(quote_market(&base, &opts, 1_000).is_none());
        assert!(quote_market(&base, &opts, opts.quote_refresh_interval_ms).is_some());
    }

    #[test]
    fn flow_toxicity_detector_flags_one_sided_volume() {
        let detector = FlowToxicityDetector { threshold: dec!(0.8) };
        let trades = vec![
            Trade { timestamp: 0, side: Side::Buy, price: dec!(100), amount: dec!(9) },
            Trade { timestamp: 0, side: Side::Sell, price: dec!(100), amount: dec!(1) },
        ];
        assert!(detector.is_toxic(&trades));

        let balanced = vec![
            Trade { timestamp: 0, side: Side::Buy, price: dec!(100), amount: dec!(5) },
            Trade { timestamp: 0, side: Side::Sell, price: dec!(100), amount: dec!(5) },
        ];
        assert!(!detector.is_toxic(&balanced));
    }
}
