use crate::mirror::{OrderBook, Trade};
use async_trait::async_trait;
use mm_instrument::{Candle, Market, Order, OrderId, OrderType, Side, Ticker};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

/// Errors an [`ExchangeClient`] adapter can raise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("network error talking to the exchange: {0}")]
    NetworkError(String),

    #[error("rate limited by the exchange")]
    RateLimited,

    #[error("exchange returned an unexpected response: {0}")]
    BadResponse(String),

    #[error("unknown market {0}")]
    MarketUnknown(String),
}

/// Candle timeframe literal. `OneMin`, `FifteenMin`, `OneHour` and `OneDay`
/// cover everything the entry/exit/market-maker layers consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    OneMin,
    FifteenMin,
    OneHour,
    OneDay,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        }
    }
}

/// Narrow adapter to a remote spot exchange.
///
/// Implementations MUST round `price`/`amount` to the market's native
/// precision before submission, and MUST fail-soft (return `None`) from
/// [`ExchangeClient::fetch_ohlcv`] on rate-limit/unknown-market rather than
/// erroring — callers are required to handle the `None` case.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Refreshes symbol metadata. Callers should invoke this at most every 24h.
    async fn load_markets(&self) -> Result<(), PortError>;

    async fn get_markets(&self, fiat: Option<&str>) -> Result<Vec<Market>, PortError>;

    async fn get_min_deal_amount(&self, market: &Market) -> Result<Decimal, PortError>;

    async fn fetch_balance(&self) -> Result<HashMap<String, (Decimal, Decimal)>, PortError>;

    async fn fetch_tickers(
        &self,
        markets: Option<&[Market]>,
    ) -> Result<HashMap<Market, Ticker>, PortError>;

    async fn fetch_order_book(
        &self,
        markets: &[Market],
        depth: Option<usize>,
    ) -> Result<HashMap<Market, OrderBook>, PortError>;

    async fn fetch_trades(
        &self,
        markets: &[Market],
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Result<HashMap<Market, Vec<Trade>>, PortError>;

    async fn fetch_open_orders(&self, market: Option<&Market>) -> Result<Vec<Order>, PortError>;

    /// Fails soft: returns `None` on rate-limit or unknown-market conditions
    /// instead of propagating an error.
    async fn fetch_ohlcv(
        &self,
        market: &Market,
        timeframe: Timeframe,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> Option<Vec<Candle>>;

    async fn create_order(
        &self,
        market: &Market,
        order_type: OrderType,
        side: Side,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderId, PortError>;

    async fn cancel_order(&self, order: &Order) -> Result<(), PortError>;
}
