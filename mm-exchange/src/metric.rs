use serde::{Deserialize, Serialize};

/// Fixed counters tracked on the mirror. Consumed by logging only, no
/// metrics transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub orders_placed: u64,
    pub orders_cancelled: u64,
    pub reconciliation_mismatches: u64,
    pub drawdown_events: u64,
}

impl Metrics {
    pub fn record_order_placed(&mut self) {
        self.orders_placed += 1;
    }

    pub fn record_order_cancelled(&mut self) {
        self.orders_cancelled += 1;
    }

    pub fn record_reconciliation_mismatch(&mut self) {
        self.reconciliation_mismatches += 1;
    }

    pub fn record_drawdown_event(&mut self) {
        self.drawdown_events += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment_independently() {
        let mut metrics = Metrics::default();
        assert_eq!(metrics, Metrics::default());

        metrics.record_order_placed();
        metrics.record_order_placed();
        metrics.record_order_cancelled();
        metrics.record_reconciliation_mismatch();
        metrics.record_drawdown_event();

        assert_eq!(metrics.orders_placed, 2);
        assert_eq!(metrics.orders_cancelled, 1);
        assert_eq!(metrics.reconciliation_mismatches, 1);
        assert_eq!(metrics.drawdown_events, 1);
    }
}
