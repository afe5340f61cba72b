//! The exchange state mirror: the local order/balance/ticker mirror of a
//! remote spot exchange, and the narrow [`ExchangeClient`] port it
//! reconciles against.

mod error;
mod event;
mod id;
mod metric;
mod mirror;
mod port;
mod rate_limit;

pub use error::ExchangeError;
pub use event::{Event, EventKind};
pub use metric::Metrics;
pub use mirror::{CreateOrderRequest, ExchangeConfig, ExchangeMirror, OrderBook, Trade};
pub use port::{ExchangeClient, PortError, Timeframe};
pub use rate_limit::RateLimiter;
