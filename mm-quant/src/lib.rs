//! GBM parameter estimation and Guéant-Lehalle-Fernandez-Tapia quoting.
//!
//! Pure maths lives in `f64` here: the engine's monetary types elsewhere are
//! `rust_decimal::Decimal`, but the GBM/Guéant formulas lean on `ln`, `exp`
//! and `sqrt` of intermediate quantities that have no natural fixed-point
//! representation, so this crate converts at its boundary (candle closes in)
//! the way the rest of the workspace keeps `Decimal` for money and `f64` for
//! the quantitative model layer only.

mod estimator;
mod quote;

pub use estimator::{
    compute_gbm_parameters, compute_market_dynamics_parameters, GbmParameters,
    MarketDynamicsParameters, QuantError, SideDynamics,
};
pub use quote::{compute_quote, compute_spread, Quote};
