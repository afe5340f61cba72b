use mm_instrument::{Market, OrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Structured, append-only events persisted on the exchange mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: i64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    LimitOrderCreated { order_id: OrderId, market: Market },
    MarketOrderCreated { order_id: OrderId, market: Market },
    LimitOrderCancelled { order_id: OrderId, market: Market },
    MarketOrderCancelled { order_id: OrderId, market: Market },
    LimitOrderFulfilled { order_id: OrderId, market: Market },
    MaxDrawdownReached { peak: Decimal, current_total: Decimal },
    ReconciliationMismatch { market: Market, local: usize, remote: usize },
}

impl Event {
    pub fn new(timestamp: i64, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }
}
