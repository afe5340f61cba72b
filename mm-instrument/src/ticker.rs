use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Best bid/ask, last trade and volumes for a market at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub timestamp: i64,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub base_volume: Decimal,
    pub quote_volume: Decimal,
}

impl Ticker {
    pub fn new(
        timestamp: i64,
        bid: Decimal,
        ask: Decimal,
        last: Decimal,
        base_volume: Decimal,
        quote_volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            bid,
            ask,
            last,
            base_volume,
            quote_volume,
        }
    }

    /// `(bid + ask) / 2`.
    pub fn average(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::from(2)
    }

    /// `ask - bid`.
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn average_and_spread() {
        let t = Ticker::new(0, dec!(99), dec!(101), dec!(100), dec!(10), dec!(1000));
        assert_eq!(t.average(), dec!(100));
        assert_eq!(t.spread(), dec!(2));
    }
}
