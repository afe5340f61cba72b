//! Exit triggers (take-profit, return-based, opt-in trailing-stop) and
//! sticky-sell placement. Grounded the same way as [`crate::entry`].

use mm_core::period_to_ms;
use mm_instrument::{Candle, Ticker};
use mm_ta::{atr, ema, log_returns, ma, rsi, tail};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub struct TrailingStopConfig {
    pub volatility_multiplier: Decimal,
}

#[derive(Debug, Clone)]
pub struct ExitOptions {
    pub take_profit_rsi_threshold: Decimal,
    pub min_next_quote_difference: Decimal,
    pub take_profit_atr_multiplier: Decimal,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub return_based_exit_after: String,
    pub ma_period_returns: usize,
    pub return_threshold: Decimal,
    pub ema_period_slow: usize,
    /// Present only when the agent has explicitly opted in; `None` means
    /// trailing-stop never fires.
    pub trailing_stop: Option<TrailingStopConfig>,
}

impl Default for ExitOptions {
    fn default() -> Self {
        Self {
            take_profit_rsi_threshold: dec!(80),
            min_next_quote_difference: dec!(0.005),
            take_profit_atr_multiplier: dec!(3),
            rsi_period: 14,
            atr_period: 20,
            return_based_exit_after: "24h".to_string(),
            ma_period_returns: 20,
            return_threshold: dec!(-0.01),
            ema_period_slow: 20,
            trailing_stop: None,
        }
    }
}

pub struct ExitInputs<'a> {
    pub now: i64,
    pub ticker: Ticker,
    pub entry_price: Decimal,
    pub entry_timestamp: i64,
    pub day_candles: &'a [Candle],
    pub hour_candles: &'a [Candle],
    pub highest_price_since_entry: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    TakeProfitRsi,
    TakeProfitAtr,
    ReturnBased,
    TrailingStop,
}

fn take_profit_rsi(inputs: &ExitInputs, opts: &ExitOptions) -> bool {
    let rsi_values = rsi(inputs.day_candles, opts.rsi_period);
    let rsi_tail = tail(&rsi_values).unwrap_or(Decimal::ZERO);
    rsi_tail >= opts.take_profit_rsi_threshold
        && inputs.ticker.ask > inputs.entry_price * (Decimal::ONE + opts.min_next_quote_difference)
}

fn take_profit_atr(inputs: &ExitInputs, opts: &ExitOptions) -> bool {
    let atr_values = atr(inputs.day_candles, opts.atr_period);
    let atr_tail = tail(&atr_values).unwrap_or(Decimal::ZERO);
    inputs.ticker.ask >= inputs.entry_price + opts.take_profit_atr_multiplier * atr_tail
}

fn return_based(inputs: &ExitInputs, opts: &ExitOptions) -> bool {
    let after_ms = period_to_ms(&opts.return_based_exit_after).unwrap_or(86_400_000);
    if inputs.now < inputs.entry_timestamp + after_ms as i64 {
        return false;
    }

    let day_closes: Vec<Decimal> = inputs.day_candles.iter().map(|c| c.close).collect();
    let returns = log_returns(inputs.day_candles);
    let ma_returns = tail(&ma(&returns, opts.ma_period_returns)).unwrap_or(Decimal::ZERO);
    if ma_returns > opts.return_threshold {
        return false;
    }

    let hour_closes: Vec<Decimal> = inputs.hour_candles.iter().map(|c| c.close).collect();
    let ema_slow = tail(&ema(&hour_closes, opts.ema_period_slow)).unwrap_or(Decimal::ZERO);
    let _ = day_closes;
    inputs.ticker.average() > ema_slow
}

fn trailing_stop(inputs: &ExitInputs, cfg: &TrailingStopConfig, opts: &ExitOptions) -> bool {
    let atr_values = atr(inputs.day_candles, opts.atr_period);
    let atr_tail = tail(&atr_values).unwrap_or(Decimal::ZERO);
    let stop = compute_stop_price(inputs.highest_price_since_entry, atr_tail, cfg.volatility_multiplier);
    inputs.ticker.ask < stop
}

/// `highest_price_since_entry - atr * volatility_multiplier`. Unused by the
/// default exit trigger unless `ExitOptions::trailing_stop` is set.
pub fn compute_stop_price(highest_price_since_entry: Decimal, atr_value: Decimal, volatility_multiplier: Decimal) -> Decimal {
    highest_price_since_entry - atr_value * volatility_multiplier
}

/// `takeProfitExitPossible ∨ returnBasedExitPossible`, plus trailing-stop
/// when opted in. Returns the first trigger that fires, evaluated in spec
/// order.
pub fn exit_trigger(inputs: &ExitInputs, opts: &ExitOptions) -> Option<ExitTrigger> {
    if take_profit_rsi(inputs, opts) {
        return Some(ExitTrigger::TakeProfitRsi);
    }
    if take_profit_atr(inputs, opts) {
        return Some(ExitTrigger::TakeProfitAtr);
    }
    if return_based(inputs, opts) {
        return Some(ExitTrigger::ReturnBased);
    }
    if let Some(cfg) = &opts.trailing_stop {
        if trailing_stop(inputs, cfg, opts) {
            return Some(ExitTrigger::TrailingStop);
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitDecision {
    /// A sticky sell is open and exit is no longer needed: cancel, hold position.
    CancelAndHold,
    /// A sticky sell is open and still needed: keep waiting.
    RemainTryingToLeave,
    /// Base balance too small to bother exiting.
    NotInMarket,
    /// A trigger fired: place a sticky sell for all free base balance.
    Exit { amount: Decimal, trigger: ExitTrigger },
    Hold,
}

pub struct ExitContext {
    pub has_sticky_sell: bool,
    pub base_balance_total: Decimal,
    pub base_balance_free: Decimal,
    pub min_deal_amount: Decimal,
    pub minimum_notional: Decimal,
    pub can_trade: bool,
}

pub fn evaluate_exit(inputs: &ExitInputs, opts: &ExitOptions, ctx: &ExitContext) -> ExitDecision {
    let notional_floor = if inputs.ticker.ask.is_zero() {
        Decimal::ZERO
    } else {
        ctx.minimum_notional / inputs.ticker.ask
    };
    let floor = ctx.min_deal_amount.max(notional_floor);

    if ctx.base_balance_total <= floor {
        return ExitDecision::NotInMarket;
    }

    if ctx.has_sticky_sell {
        let trigger_active = exit_trigger(inputs, opts).is_some();
        return if !trigger_active && ctx.can_trade {
            ExitDecision::CancelAndHold
        } else {
            ExitDecision::RemainTryingToLeave
        };
    }

    match exit_trigger(inputs, opts) {
        Some(trigger) => ExitDecision::Exit {
            amount: ctx.base_balance_free,
            trigger,
        },
        None => ExitDecision::Hold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(n: usize, close_start: Decimal, step: Decimal) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = close_start + step * Decimal::from(i as i64);
                Candle::new(i as i64 * 86_400_000, close, close + dec!(1), close - dec!(1), close, dec!(10))
            })
            .collect()
    }

    #[test]
    fn take_profit_rsi_fires_on_strong_uptrend() {
        let days = candles(30, dec!(100), dec!(2));
        let hours = candles(60, dec!(100), dec!(2));
        let inputs = ExitInputs {
            now: 1_000_000,
            ticker: Ticker::new(0, dec!(199), dec!(200), dec!(199.5), dec!(10), dec!(1000)),
            entry_price: dec!(100),
            entry_timestamp: 0,
            day_candles: &days,
            hour_candles: &hours,
            highest_price_since_entry: dec!(200),
        };
        assert_eq!(exit_trigger(&inputs, &ExitOptions::default()), Some(ExitTrigger::TakeProfitRsi));
    }

    #[test]
    fn not_in_market_when_below_floor() {
        let days = candles(30, dec!(100), dec!(0));
        let hours = candles(60, dec!(100), dec!(0));
        let inputs = ExitInputs {
            now: 0,
            ticker: Ticker::new(0, dec!(99), dec!(100), dec!(99.5), dec!(10), dec!(1000)),
            entry_price: dec!(100),
            entry_timestamp: 0,
            day_candles: &days,
            hour_candles: &hours,
            highest_price_since_entry: dec!(100),
        };
        let ctx = ExitContext {
            has_sticky_sell: false,
            base_balance_total: dec!(0.1),
            base_balance_free: dec!(0.1),
            min_deal_amount: dec!(1),
            minimum_notional: Decimal::ZERO,
            can_trade: true,
        };
        assert_eq!(evaluate_exit(&inputs, &ExitOptions::default(), &ctx), ExitDecision::NotInMarket);
    }
}
