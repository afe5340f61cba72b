use rust_decimal::Decimal;

/// Simple moving average. At index `i` this averages a window of size
/// `min(i + 1, period)` ending at `i`, so the series is defined from index 0.
pub fn ma(x: &[Decimal], period: usize) -> Vec<Decimal> {
    let period = period.max(1);
    let mut out = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let window_len = (i + 1).min(period);
        let start = i + 1 - window_len;
        let sum: Decimal = x[start..=i].iter().copied().sum();
        out.push(sum / Decimal::from(window_len as u64));
    }
    out
}

/// Exponential moving average with smoothing `k = 2 / (period + 1)`.
pub fn ema(x: &[Decimal], period: usize) -> Vec<Decimal> {
    let period = period.max(1);
    let k = Decimal::from(2u64) / Decimal::from(period as u64 + 1);
    let mut out = Vec::with_capacity(x.len());
    for (i, &v) in x.iter().enumerate() {
        if i == 0 {
            out.push(v);
        } else {
            let prev = out[i - 1];
            out.push(v * k + prev * (Decimal::ONE - k));
        }
    }
    out
}

/// Volume-weighted EMA: `ema(x * v, period) / ema(v, period)`, elementwise.
pub fn volume_ema(x: &[Decimal], v: &[Decimal], period: usize) -> Vec<Decimal> {
    debug_assert_eq!(x.len(), v.len());
    let xv: Vec<Decimal> = x.iter().zip(v.iter()).map(|(a, b)| *a * *b).collect();
    let num = ema(&xv, period);
    let den = ema(v, period);
    num.iter()
        .zip(den.iter())
        .map(|(n, d)| if d.is_zero() { Decimal::ZERO } else { *n / *d })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ma_of_constant_series_is_constant() {
        let x = vec![dec!(5); 10];
        let out = ma(&x, 4);
        assert!(out.iter().all(|v| *v == dec!(5)));
    }

    #[test]
    fn ema_of_ma_of_constant_equals_constant() {
        let x = vec![dec!(7); 20];
        let smoothed = ma(&x, 5);
        let out = ema(&smoothed, 5);
        for v in out {
            assert_eq!(v, dec!(7));
        }
    }

    #[test]
    fn ema_first_value_seeds_from_input() {
        let x = vec![dec!(1), dec!(2), dec!(3)];
        let out = ema(&x, 2);
        assert_eq!(out[0], dec!(1));
    }

    #[test]
    fn ma_window_grows_until_period() {
        let x = vec![dec!(1), dec!(2), dec!(3), dec!(4)];
        let out = ma(&x, 3);
        assert_eq!(out[0], dec!(1));
        assert_eq!(out[1], dec!(1.5));
        assert_eq!(out[2], dec!(2));
        assert_eq!(out[3], dec!(3)); // (2+3+4)/3
    }
}
