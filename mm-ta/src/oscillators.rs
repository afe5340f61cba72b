use crate::moving_average::ema;
use mm_instrument::Candle;
use rust_decimal::Decimal;

/// Average True Range. `tr[0] = high - low`; for `i > 0`,
/// `tr[i] = max(high-low, |high - close[i-1]|, |low - close[i-1]|)`, then
/// `atr = ema(tr, period)`.
pub fn atr(candles: &[Candle], period: usize) -> Vec<Decimal> {
    let mut tr = Vec::with_capacity(candles.len());
    for (i, c) in candles.iter().enumerate() {
        let range = c.high - c.low;
        if i == 0 {
            tr.push(range);
        } else {
            let prev_close = candles[i - 1].close;
            let a = (c.high - prev_close).abs();
            let b = (c.low - prev_close).abs();
            tr.push(range.max(a).max(b));
        }
    }
    ema(&tr, period)
}

/// Relative Strength Index.
///
/// `up[i] = max(0, close[i]-close[i-1])`, `dn[i] = max(0, close[i-1]-close[i])`;
/// `rsi = 100 - 100/(1 + ema(up,p)/ema(dn,p))`, and `100` wherever `ema(dn) == 0`.
///
/// This is the *corrected* formula. The original source this was ported
/// from has a precedence bug in the final step (`100 - (100/1 + rs)`); that
/// variant is kept separately as [`rsi_legacy_precedence_bug`] and is never
/// used by default.
pub fn rsi(candles: &[Candle], period: usize) -> Vec<Decimal> {
    let (up, dn) = up_down(candles);
    let ema_up = ema(&up, period);
    let ema_dn = ema(&dn, period);

    ema_up
        .iter()
        .zip(ema_dn.iter())
        .map(|(u, d)| {
            if d.is_zero() {
                Decimal::from(100)
            } else {
                let rs = *u / *d;
                Decimal::from(100) - Decimal::from(100) / (Decimal::ONE + rs)
            }
        })
        .collect()
}

/// The literal buggy formula `100 - (100/1 + rs)` preserved from the
/// original source for anyone needing bit-identical legacy behavior. Do not
/// use this as the default RSI — see [`rsi`].
pub fn rsi_legacy_precedence_bug(candles: &[Candle], period: usize) -> Vec<Decimal> {
    let (up, dn) = up_down(candles);
    let ema_up = ema(&up, period);
    let ema_dn = ema(&dn, period);

    ema_up
        .iter()
        .zip(ema_dn.iter())
        .map(|(u, d)| {
            if d.is_zero() {
                Decimal::from(100)
            } else {
                let rs = *u / *d;
                Decimal::from(100) - (Decimal::from(100) / Decimal::ONE + rs)
            }
        })
        .collect()
}

fn up_down(candles: &[Candle]) -> (Vec<Decimal>, Vec<Decimal>) {
    let mut up = Vec::with_capacity(candles.len());
    let mut dn = Vec::with_capacity(candles.len());
    for i in 0..candles.len() {
        if i == 0 {
            up.push(Decimal::ZERO);
            dn.push(Decimal::ZERO);
        } else {
            let delta = candles[i].close - candles[i - 1].close;
            up.push(delta.max(Decimal::ZERO));
            dn.push((-delta).max(Decimal::ZERO));
        }
    }
    (up, dn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(close: Decimal) -> Candle {
        Candle::new(0, close, close, close, close, dec!(1))
    }

    #[test]
    fn rsi_of_monotone_increasing_closes_is_100() {
        let candles: Vec<Candle> = (0..20).map(|i| candle(Decimal::from(i))).collect();
        let out = rsi(&candles, 14);
        // after the initial seed, dn stays at 0 so rsi saturates at 100.
        assert_eq!(*out.last().unwrap(), dec!(100));
    }

    #[test]
    fn atr_first_value_is_high_minus_low() {
        let mut c = candle(dec!(100));
        c.high = dec!(105);
        c.low = dec!(95);
        let candles = vec![c];
        let out = atr(&candles, 14);
        assert_eq!(out[0], dec!(10));
    }
}
