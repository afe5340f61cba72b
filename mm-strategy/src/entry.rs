//! Entry gating and sticky-buy placement. Grounded on `jackbot-strategy/src/lib.rs`'s
//! `Strategy<Event>` trait shape and `src/strategy/strategy.rs`'s signal-producing style.

use mm_instrument::{Candle, Ticker};
use mm_ta::{atr, ema, log_returns, ma, tail};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub struct EntryOptions {
    pub minimum_trend: Decimal,
    pub maximum_price_level: Decimal,
    pub minimum_returns_period: usize,
    pub minimum_returns: Decimal,
    pub ma_period_volume: usize,
    pub ema_period_daily_retracement: usize,
    pub atr_retracement_multiplier: Decimal,
    pub ema_period_fast: usize,
    pub ema_period_mid: usize,
    pub volume_balance_period: usize,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            minimum_trend: dec!(0.1),
            maximum_price_level: dec!(0.6),
            minimum_returns_period: 14,
            minimum_returns: dec!(0.01),
            ma_period_volume: 20,
            ema_period_daily_retracement: 20,
            atr_retracement_multiplier: dec!(1),
            ema_period_fast: 12,
            ema_period_mid: 26,
            volume_balance_period: 20,
        }
    }
}

/// Everything `entry_possible` needs about a market at the current tick.
pub struct EntryInputs<'a> {
    pub trend: Decimal,
    pub price_level: Decimal,
    pub ticker: Ticker,
    pub day_candles: &'a [Candle],
    pub hour_candles: &'a [Candle],
    pub recent_buy_volume: Decimal,
    pub recent_sell_volume: Decimal,
}

/// All clauses must hold, evaluated in spec order so cheap checks
/// (`trend`, `price_level`) short-circuit before indicator computation.
pub fn entry_possible(inputs: &EntryInputs, opts: &EntryOptions) -> bool {
    if inputs.trend < opts.minimum_trend {
        return false;
    }
    if inputs.price_level > opts.maximum_price_level {
        return false;
    }

    if inputs.day_candles.len() < 2 {
        return false;
    }
    let trimmed = &inputs.day_candles[..inputs.day_candles.len() - 1];
    let returns = log_returns(trimmed);
    let ma_returns = ma(&returns, opts.minimum_returns_period);
    if tail(&ma_returns).unwrap_or(Decimal::ZERO) < opts.minimum_returns {
        return false;
    }

    let window_start = returns.len().saturating_sub(opts.minimum_returns_period);
    let required = opts.minimum_returns_period / 3;
    let hits = returns[window_start..].iter().filter(|r| **r >= opts.minimum_returns).count();
    if hits < required {
        return false;
    }

    let volumes: Vec<Decimal> = trimmed.iter().map(|c| c.volume).collect();
    let ma_volumes = ma(&volumes, opts.ma_period_volume);
    if tail(&volumes).unwrap_or(Decimal::ZERO) < tail(&ma_volumes).unwrap_or(Decimal::ZERO) {
        return false;
    }

    let day_closes: Vec<Decimal> = inputs.day_candles.iter().map(|c| c.close).collect();
    let ema_daily = ema(&day_closes, opts.ema_period_daily_retracement);
    let atr_daily = atr(inputs.day_candles, opts.ema_period_daily_retracement);
    let retracement_floor = tail(&ema_daily).unwrap_or(Decimal::ZERO)
        - tail(&atr_daily).unwrap_or(Decimal::ZERO) * opts.atr_retracement_multiplier;
    if inputs.ticker.bid >= retracement_floor {
        return false;
    }

    let hour_closes: Vec<Decimal> = inputs.hour_candles.iter().map(|c| c.close).collect();
    let ema_fast = tail(&ema(&hour_closes, opts.ema_period_fast)).unwrap_or(Decimal::ZERO);
    let ema_mid = tail(&ema(&hour_closes, opts.ema_period_mid)).unwrap_or(Decimal::ZERO);
    if ema_fast >= ema_mid {
        return false;
    }

    let total_volume = inputs.recent_buy_volume + inputs.recent_sell_volume;
    let volume_balance = if total_volume.is_zero() {
        Decimal::ZERO
    } else {
        (inputs.recent_buy_volume - inputs.recent_sell_volume) / total_volume
    };
    volume_balance >= Decimal::ZERO
}

/// Outcome of evaluating entry for one market on one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    /// A sticky buy is already open and conditions still hold: keep waiting.
    RemainTryingToEnter,
    /// A sticky buy is open but conditions no longer hold: cancel and go idle.
    CancelAndIdle,
    /// Already holding enough base balance; entry has nothing to do.
    AlreadyInMarket,
    /// Conditions hold and budget allows a new sticky buy.
    AttemptEntry { amount: Decimal, price: Decimal },
    /// No sticky order, not in market, conditions or budget insufficient.
    NoEntry,
}

pub struct EntryContext {
    pub has_sticky_buy: bool,
    pub base_balance_total: Decimal,
    pub min_deal_amount: Decimal,
    pub minimum_notional: Decimal,
    pub target_balance: Decimal,
    pub can_enter_more_markets: bool,
    pub quote_balance_free: Decimal,
}

pub fn evaluate_entry(inputs: &EntryInputs, opts: &EntryOptions, ctx: &EntryContext) -> EntryDecision {
    if ctx.has_sticky_buy {
        return if entry_possible(inputs, opts) {
            EntryDecision::RemainTryingToEnter
        } else {
            EntryDecision::CancelAndIdle
        };
    }

    if ctx.base_balance_total >= ctx.min_deal_amount {
        return EntryDecision::AlreadyInMarket;
    }

    if ctx.target_balance <= Decimal::ZERO || !ctx.can_enter_more_markets || !entry_possible(inputs, opts) {
        return EntryDecision::NoEntry;
    }

    let wanted = (ctx.target_balance - ctx.base_balance_total).max(Decimal::ZERO);
    let quote_budget_as_base = if inputs.ticker.bid.is_zero() {
        Decimal::ZERO
    } else {
        ctx.quote_balance_free / inputs.ticker.bid
    };
    let amount = wanted.min(quote_budget_as_base);

    let notional_floor = if inputs.ticker.bid.is_zero() {
        Decimal::ZERO
    } else {
        ctx.minimum_notional / inputs.ticker.bid
    };
    let floor = ctx.min_deal_amount.max(notional_floor);

    if amount < floor {
        return EntryDecision::NoEntry;
    }

    EntryDecision::AttemptEntry {
        amount,
        price: inputs.ticker.bid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(n: usize, trend_up: bool) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = Decimal::from(100 + if trend_up { i as i64 } else { 0 });
                Candle::new(i as i64 * 86_400_000, base, base + dec!(1), base - dec!(1), base, dec!(100))
            })
            .collect()
    }

    fn ticker() -> Ticker {
        Ticker::new(0, dec!(50), dec!(51), dec!(50), dec!(10), dec!(500))
    }

    #[test]
    fn low_trend_short_circuits_before_indicator_work() {
        let days = candles(40, true);
        let hours = candles(70, true);
        let inputs = EntryInputs {
            trend: dec!(0.05),
            price_level: dec!(0.3),
            ticker: ticker(),
            day_candles: &days,
            hour_candles: &hours,
            recent_buy_volume: dec!(1),
            recent_sell_volume: dec!(1),
        };
        assert!(!entry_possible(&inputs, &EntryOptions::default()));
    }

    #[test]
    fn already_in_market_reports_no_action() {
        let days = candles(40, false);
        let hours = candles(70, false);
        let inputs = EntryInputs {
            trend: dec!(0.2),
            price_level: dec!(0.3),
            ticker: ticker(),
            day_candles: &days,
            hour_candles: &hours,
            recent_buy_volume: dec!(1),
            recent_sell_volume: dec!(1),
        };
        let ctx = EntryContext {
            has_sticky_buy: false,
            base_balance_total: dec!(5),
            min_deal_amount: dec!(1),
            minimum_notional: Decimal::ZERO,
            target_balance: dec!(10),
            can_enter_more_markets: true,
            quote_balance_free: dec!(1000),
        };
        assert_eq!(evaluate_entry(&inputs, &EntryOptions::default(), &ctx), EntryDecision::AlreadyInMarket);
    }
}
