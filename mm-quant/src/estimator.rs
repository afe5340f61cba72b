use mm_instrument::Candle;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantError {
    #[error("insufficient candles for estimation: need {needed}, have {have}")]
    InsufficientData { needed: usize, have: usize },
}

/// Geometric Brownian Motion parameters estimated from hourly log-returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbmParameters {
    /// Day-scaled annualized-style log-return standard deviation.
    pub sigma: f64,
    /// Drift.
    pub mu: f64,
}

/// First-passage-time fitted venue dynamics for one order side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideDynamics {
    pub a: f64,
    pub k: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketDynamicsParameters {
    pub buy: SideDynamics,
    pub sell: SideDynamics,
}

const GBM_CANDLES_REQUIRED: usize = 24 * 7;

/// Estimates `(sigma, mu)` from the last `24*7` 1h candles' log-returns:
/// `sigma = std_unbiased(r) * sqrt(24)`, `mu = mean(r) * 24 + sigma^2 / 2`.
pub fn compute_gbm_parameters(hourly_candles: &[Candle]) -> Result<GbmParameters, QuantError> {
    if hourly_candles.len() < GBM_CANDLES_REQUIRED {
        return Err(QuantError::InsufficientData {
            needed: GBM_CANDLES_REQUIRED,
            have: hourly_candles.len(),
        });
    }

    let window = &hourly_candles[hourly_candles.len() - GBM_CANDLES_REQUIRED..];
    let closes: Vec<f64> = window.iter().map(|c| dec_to_f64(c.close)).collect();
    let returns = log_returns_f64(&closes);

    let mean = mean(&returns);
    let std = std_unbiased(&returns, mean);

    let sigma = std * 24f64.sqrt();
    let mu = mean * 24.0 + sigma.powi(2) / 2.0;

    Ok(GbmParameters { sigma, mu })
}

const DYNAMICS_N: usize = 1000;
const SPREAD_PRECISION: f64 = 0.03;
const DYNAMICS_STEPS: usize = 100;

/// Estimates order-book first-passage-time dynamics `{A, k}` for each side
/// from `N` 15m candles.
pub fn compute_market_dynamics_parameters(
    candles_15m: &[Candle],
) -> Result<MarketDynamicsParameters, QuantError> {
    if candles_15m.len() < DYNAMICS_N + 1 {
        return Err(QuantError::InsufficientData {
            needed: DYNAMICS_N + 1,
            have: candles_15m.len(),
        });
    }

    let n = DYNAMICS_N.min(candles_15m.len() - 1);
    let window = &candles_15m[candles_15m.len() - n - 1..];

    let open0 = dec_to_f64(window[0].open);
    let delta_p = open0 * (SPREAD_PRECISION / (2.0 * DYNAMICS_STEPS as f64));

    let mut buy_sum = vec![0f64; DYNAMICS_STEPS];
    let mut buy_count = vec![0u64; DYNAMICS_STEPS];
    let mut sell_sum = vec![0f64; DYNAMICS_STEPS];
    let mut sell_count = vec![0u64; DYNAMICS_STEPS];

    let half = n / 2;
    for i in 0..half {
        let mid = 0.5 * dec_to_f64(window[i].close) + 0.5 * dec_to_f64(window[i + 1].close);

        for (day_index, c) in window.iter().enumerate().skip(i + 1) {
            let low = dec_to_f64(c.low);
            let high = dec_to_f64(c.high);
            let tau_days = (day_index - i) as f64 / 96.0; // 15m candles per day = 96

            for s in 0..DYNAMICS_STEPS {
                let threshold = (s + 1) as f64 * delta_p;
                if mid - low > threshold {
                    buy_sum[s] += tau_days;
                    buy_count[s] += 1;
                }
                if high - mid > threshold {
                    sell_sum[s] += tau_days;
                    sell_count[s] += 1;
                }
            }
        }
    }

    Ok(MarketDynamicsParameters {
        buy: fit_side(&buy_sum, &buy_count, delta_p),
        sell: fit_side(&sell_sum, &sell_count, delta_p),
    })
}

/// Fits `log(count/sum) = b - k * s * delta_p` by simple linear regression
/// over the steps with a defined (nonzero-sum) observation, then returns
/// `A = exp(b)`, `k = -slope`.
fn fit_side(sum: &[f64], count: &[u64], delta_p: f64) -> SideDynamics {
    let mut xs = Vec::with_capacity(sum.len());
    let mut ys = Vec::with_capacity(sum.len());

    for s in 0..sum.len() {
        if sum[s] > 0.0 && count[s] > 0 {
            let log_lambda = (count[s] as f64 / sum[s]).ln();
            if log_lambda.is_finite() {
                xs.push((s + 1) as f64 * delta_p);
                ys.push(log_lambda);
            }
        }
    }

    if xs.len() < 2 {
        return SideDynamics { a: 0.0, k: 0.0 };
    }

    let (slope, intercept) = simple_linear_regression(&xs, &ys);
    SideDynamics {
        a: intercept.exp(),
        k: -slope,
    }
}

/// Ordinary least squares slope/intercept for `y = intercept + slope * x`.
fn simple_linear_regression(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean_x = mean(xs);
    let mean_y = mean(ys);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for i in 0..xs.len() {
        cov += (xs[i] - mean_x) * (ys[i] - mean_y);
        var_x += (xs[i] - mean_x).powi(2);
    }

    if var_x == 0.0 || n == 0.0 {
        return (0.0, mean_y);
    }

    let slope = cov / var_x;
    let intercept = mean_y - slope * mean_x;
    (slope, intercept)
}

fn log_returns_f64(closes: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    for i in 1..closes.len() {
        out.push((closes[i] / closes[i - 1]).ln());
    }
    out
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_unbiased(values: &[f64], mean_value: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| (v - mean_value).powi(2))
        .sum::<f64>()
        / (values.len() as f64 - 1.0);
    variance.sqrt()
}

fn dec_to_f64(d: rust_decimal::Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn flat_hourly_candles(n: usize, close: rust_decimal::Decimal) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64 * 3_600_000, close, close, close, close, dec!(1)))
            .collect()
    }

    #[test]
    fn insufficient_data_is_rejected() {
        let candles = flat_hourly_candles(10, dec!(100));
        assert!(matches!(
            compute_gbm_parameters(&candles),
            Err(QuantError::InsufficientData { .. })
        ));
    }

    #[test]
    fn flat_price_series_has_zero_sigma_and_zero_mu() {
        let candles = flat_hourly_candles(24 * 7, dec!(100));
        let params = compute_gbm_parameters(&candles).unwrap();
        assert!(params.sigma.abs() < 1e-9);
        assert!(params.mu.abs() < 1e-9);
    }

    #[test]
    fn dynamics_requires_enough_15m_candles() {
        let candles = flat_hourly_candles(10, dec!(100));
        assert!(matches!(
            compute_market_dynamics_parameters(&candles),
            Err(QuantError::InsufficientData { .. })
        ));
    }
}
