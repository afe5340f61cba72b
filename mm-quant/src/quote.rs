use crate::estimator::SideDynamics;
use serde::{Deserialize, Serialize};

/// A two-sided quote around a mid price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

/// `ask - bid`.
pub fn compute_spread(quote: Quote) -> f64 {
    quote.ask - quote.bid
}

/// Guéant-Lehalle-Fernandez-Tapia optimal bid/ask distances.
///
/// `inventory` is the signed unit-inventory position `q`. `drift` folds in
/// the `mu/(gamma*sigma^2)` adjustment on both multipliers when set.
/// Returns `{bid: 0, ask: 0}` if `sigma`, `gamma` or either side's `A*k` term
/// is zero or produces a non-finite intermediate, guarding against undefined
/// distances.
#[allow(clippy::too_many_arguments)]
pub fn compute_quote(
    sigma: f64,
    mu: f64,
    gamma: f64,
    buy: SideDynamics,
    sell: SideDynamics,
    mid_price: f64,
    inventory: i64,
    drift: bool,
) -> Quote {
    if sigma == 0.0 || gamma == 0.0 || buy.a * buy.k == 0.0 || sell.a * sell.k == 0.0 {
        return Quote { bid: 0.0, ask: 0.0 };
    }

    let side_terms = |side: SideDynamics| -> Option<(f64, f64)> {
        let sqrt_term = (sigma.powi(2) * gamma / (2.0 * side.k * side.a)
            * (1.0 + gamma / side.k).powf(1.0 + side.k / gamma))
        .sqrt();
        let ln_term = (1.0 / gamma) * (1.0 + gamma / side.k).ln();
        if sqrt_term.is_finite() && ln_term.is_finite() {
            Some((sqrt_term, ln_term))
        } else {
            None
        }
    };

    let (Some((sqrt_buy, ln_buy)), Some((sqrt_sell, ln_sell))) =
        (side_terms(buy), side_terms(sell))
    else {
        return Quote { bid: 0.0, ask: 0.0 };
    };

    let drift_term = if drift { mu / (gamma * sigma.powi(2)) } else { 0.0 };

    let q = inventory as f64;
    let bid_multiplier = (2.0 * q + 1.0) / 2.0 - drift_term;
    let ask_multiplier = -(2.0 * q - 1.0) / 2.0 + drift_term;

    let bid_price_distance = ln_buy + bid_multiplier * sqrt_buy;
    let ask_price_distance = ln_sell + ask_multiplier * sqrt_sell;

    let bid = mid_price.min(mid_price - bid_price_distance);
    let ask = mid_price.max(mid_price + ask_price_distance);

    Quote { bid, ask }
}
