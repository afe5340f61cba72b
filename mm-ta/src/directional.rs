use crate::moving_average::volume_ema;
use mm_instrument::Candle;
use rust_decimal::Decimal;

/// Bull/bear "points": the high/low delta since the previous candle,
/// normalized by the previous close, clamped at zero on the opposing side.
fn bull_bear_points(candles: &[Candle]) -> (Vec<Decimal>, Vec<Decimal>) {
    let mut bull = Vec::with_capacity(candles.len());
    let mut bear = Vec::with_capacity(candles.len());
    for i in 0..candles.len() {
        if i == 0 {
            bull.push(Decimal::ZERO);
            bear.push(Decimal::ZERO);
            continue;
        }
        let prev_close = candles[i - 1].close;
        if prev_close.is_zero() {
            bull.push(Decimal::ZERO);
            bear.push(Decimal::ZERO);
            continue;
        }
        let up_move = (candles[i].high - candles[i - 1].high).max(Decimal::ZERO);
        let down_move = (candles[i - 1].low - candles[i].low).max(Decimal::ZERO);
        bull.push(up_move / prev_close);
        bear.push(down_move / prev_close);
    }
    (bull, bear)
}

/// Volume-weighted EMA of bull points: the "+DI"-like component.
pub fn vdi_plus(candles: &[Candle], period: usize) -> Vec<Decimal> {
    let (bull, _) = bull_bear_points(candles);
    let volume: Vec<Decimal> = candles.iter().map(|c| c.volume).collect();
    volume_ema(&bull, &volume, period)
}

/// Volume-weighted EMA of bear points: the "-DI"-like component.
pub fn vdi_minus(candles: &[Candle], period: usize) -> Vec<Decimal> {
    let (_, bear) = bull_bear_points(candles);
    let volume: Vec<Decimal> = candles.iter().map(|c| c.volume).collect();
    volume_ema(&bear, &volume, period)
}

/// Volume-weighted directional movement index, in `[-1, 1]`:
/// `(vdi+ - vdi-) / (vdi+ + vdi-)`, or `0` if both are zero.
pub fn vdx(candles: &[Candle], period: usize) -> Vec<Decimal> {
    let plus = vdi_plus(candles, period);
    let minus = vdi_minus(candles, period);
    plus.iter()
        .zip(minus.iter())
        .map(|(p, m)| {
            let denom = *p + *m;
            if denom.is_zero() {
                Decimal::ZERO
            } else {
                (*p - *m) / denom
            }
        })
        .collect()
}
