//! Technical indicators computed over ordered candle/price sequences.
//!
//! Every function returns a `Vec` the same length as its input, matching
//! the shape the entry/exit strategies index with `tail(...)`.

mod directional;
mod moving_average;
mod oscillators;
mod returns;

pub use directional::{vdi_minus, vdi_plus, vdx};
pub use moving_average::{ema, ma, volume_ema};
pub use oscillators::{atr, rsi, rsi_legacy_precedence_bug};
pub use returns::log_returns;

/// Returns the last element of a slice, or `None` if empty. Small helper
/// used pervasively by the entry/exit strategy layer to read the latest
/// indicator value off a `Vec` returned by this crate.
pub fn tail<T: Copy>(values: &[T]) -> Option<T> {
    values.last().copied()
}
