//! Peak/drawdown tracking for a trading agent. Grounded on
//! `jackbot-risk::drawdown::DrawdownTracker`.

use rust_decimal::Decimal;
use tracing::warn;

/// Raised once an agent's total balance has fallen further than
/// `max_drawdown` below its all-time peak. Not an error: the caller is
/// expected to pause the agent and post the event, never to propagate a
/// `Result`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownTriggered {
    pub peak: Decimal,
    pub current_total: Decimal,
}

/// Tracks an agent's peak total balance and whether it is currently paused
/// by drawdown. `max_drawdown` is a fraction in `(0, 1)`, e.g. `0.2` for 20%.
#[derive(Debug, Clone)]
pub struct DrawdownGuard {
    max_drawdown: Decimal,
    peak_market_amount: Decimal,
    paused: bool,
}

impl DrawdownGuard {
    pub fn new(max_drawdown: Decimal) -> Self {
        Self {
            max_drawdown,
            peak_market_amount: Decimal::ZERO,
            paused: false,
        }
    }

    pub fn peak(&self) -> Decimal {
        self.peak_market_amount
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Restarts the peak at `total` but leaves `paused` untouched, used when
    /// an agent is created or its state is rehydrated from storage.
    pub fn seed_peak(&mut self, total: Decimal) {
        self.peak_market_amount = self.peak_market_amount.max(total);
    }

    /// An operator clearing a paused agent. Does not reset the peak.
    pub fn clear_pause(&mut self) {
        self.paused = false;
    }

    /// Updates the peak with `total` and evaluates the drawdown threshold.
    /// Once `paused` is set here, it stays set until [`Self::clear_pause`]
    /// is called explicitly; the pause latches rather than auto-clearing.
    pub fn record(&mut self, total: Decimal) -> Option<DrawdownTriggered> {
        self.peak_market_amount = self.peak_market_amount.max(total);

        if self.paused {
            return None;
        }
        if self.peak_market_amount.is_zero() {
            return None;
        }

        let drawdown = (self.peak_market_amount - total) / self.peak_market_amount;
        if drawdown > self.max_drawdown {
            self.paused = true;
            warn!(
                peak = %self.peak_market_amount,
                total = %total,
                drawdown = %drawdown,
                "drawdown guard tripped, pausing agent"
            );
            Some(DrawdownTriggered {
                peak: self.peak_market_amount,
                current_total: total,
            })
        } else {
            None
        }
    }
}
