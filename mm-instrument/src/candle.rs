use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn new(
        timestamp: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// `volume * (open + high + low + close) / 4`.
    pub fn quote_volume_estimate(&self) -> Decimal {
        self.volume * (self.open + self.high + self.low + self.close) / Decimal::from(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quote_volume_estimate_is_volume_times_avg_price() {
        let c = Candle::new(0, dec!(10), dec!(12), dec!(8), dec!(10), dec!(2));
        // avg price = (10+12+8+10)/4 = 10
        assert_eq!(c.quote_volume_estimate(), dec!(20));
    }
}
