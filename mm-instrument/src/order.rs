use crate::Market;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order identifier: either a remote exchange id or a locally generated one.
pub type OrderId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Closed,
}

/// An order tracked by the exchange state mirror.
///
/// Fields `id`, `created_at`, `market`, `order_type`, `side`, `price`,
/// `amount` and `fee` are set once at creation and never mutated. `status`,
/// `filled`, `remaining` and `timestamp_closed` mutate as the mirror
/// reconciles with the remote exchange or simulates a fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub created_at: i64,
    pub market: Market,
    pub order_type: OrderType,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee: Decimal,

    pub status: OrderStatus,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub timestamp_closed: Option<i64>,

    /// Cancel when `now - created_at > auto_cancel` (milliseconds).
    pub auto_cancel: Option<i64>,
    /// Cancel when `filled / amount >= auto_cancel_at_fill_percentage`.
    pub auto_cancel_at_fill_percentage: Decimal,
    /// For Buy: cancel when best ask > level. For Sell: cancel when best bid < level.
    pub auto_cancel_at_price_level: Decimal,
    /// If true, the mirror keeps this order at the top of the book.
    pub sticky: bool,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new_open(
        id: OrderId,
        created_at: i64,
        market: Market,
        order_type: OrderType,
        side: Side,
        price: Decimal,
        amount: Decimal,
        auto_cancel: Option<i64>,
        auto_cancel_at_fill_percentage: Decimal,
        auto_cancel_at_price_level: Decimal,
        sticky: bool,
    ) -> Self {
        Self {
            id,
            created_at,
            market,
            order_type,
            side,
            price,
            amount,
            fee: Decimal::ZERO,
            status: OrderStatus::Open,
            filled: Decimal::ZERO,
            remaining: amount,
            timestamp_closed: None,
            auto_cancel,
            auto_cancel_at_fill_percentage,
            auto_cancel_at_price_level,
            sticky,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, OrderStatus::Open)
    }

    pub fn fill_percentage(&self) -> Decimal {
        if self.amount.is_zero() {
            Decimal::ZERO
        } else {
            self.filled / self.amount
        }
    }

    /// Marks the order closed, e.g. when a fill or fulfilment completes it.
    pub fn close(&mut self, now: i64, filled: Decimal) {
        self.filled = filled;
        self.remaining = self.amount - filled;
        self.status = OrderStatus::Closed;
        self.timestamp_closed = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::new_open(
            "abc".into(),
            0,
            "BTC/USDT".parse().unwrap(),
            OrderType::Limit,
            Side::Buy,
            dec!(100),
            dec!(1),
            None,
            dec!(1),
            Decimal::MAX,
            false,
        )
    }

    #[test]
    fn amount_equals_filled_plus_remaining_invariant() {
        let mut o = order();
        assert_eq!(o.filled + o.remaining, o.amount);
        o.close(10, dec!(1));
        assert_eq!(o.filled + o.remaining, o.amount);
        assert!(!o.is_open());
    }
}
