use mm_instrument::Candle;
use rust_decimal::Decimal;

/// Log returns of closing price: `0` at index 0, else `ln(close[i] / close[i-1])`.
pub fn log_returns(candles: &[Candle]) -> Vec<Decimal> {
    let mut out = Vec::with_capacity(candles.len());
    for i in 0..candles.len() {
        if i == 0 {
            out.push(Decimal::ZERO);
        } else {
            let prev = candles[i - 1].close;
            let cur = candles[i].close;
            let ratio = if prev.is_zero() {
                Decimal::ZERO
            } else {
                cur / prev
            };
            out.push(ratio.ln());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(close: Decimal) -> Candle {
        Candle::new(0, close, close, close, close, dec!(1))
    }

    #[test]
    fn first_value_is_zero() {
        let candles = vec![candle(dec!(100)), candle(dec!(110))];
        let out = log_returns(&candles);
        assert_eq!(out[0], Decimal::ZERO);
        assert!(out[1] > Decimal::ZERO);
    }

    #[test]
    fn constant_price_has_zero_returns() {
        let candles = vec![candle(dec!(100)); 5];
        let out = log_returns(&candles);
        assert!(out.iter().all(|v| *v == Decimal::ZERO));
    }
}
