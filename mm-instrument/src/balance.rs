use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance of a single currency, with `locked` an intent set by the strategy
/// layer (distinct from `used`, which the exchange reports as tied up in
/// open orders).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    raw_free: Decimal,
    pub used: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn new(free: Decimal, used: Decimal) -> Self {
        Self {
            raw_free: free,
            used,
            locked: Decimal::ZERO,
        }
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    /// The exposed free balance: `max(0, raw.free - locked)`.
    pub fn free(&self) -> Decimal {
        (self.raw_free - self.locked).max(Decimal::ZERO)
    }

    /// Raw reported free balance, ignoring the strategy-layer reservation.
    pub fn raw_free(&self) -> Decimal {
        self.raw_free
    }

    pub fn set_raw_free(&mut self, value: Decimal) {
        self.raw_free = value;
    }

    /// `free() + used`.
    pub fn total(&self) -> Decimal {
        self.free() + self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn free_is_masked_by_lock_and_floored_at_zero() {
        let mut b = Balance::new(dec!(10), dec!(2));
        b.locked = dec!(4);
        assert_eq!(b.free(), dec!(6));
        assert_eq!(b.total(), dec!(8));

        b.locked = dec!(20);
        assert_eq!(b.free(), Decimal::ZERO);
    }
}
