//! Value types shared across the `marketmaker` engine: markets, candles,
//! tickers, balances and orders.

mod balance;
mod candle;
mod market;
mod order;
mod ticker;

pub use balance::Balance;
pub use candle::Candle;
pub use market::{Market, MarketParseError};
pub use order::{Order, OrderId, OrderStatus, OrderType, Side};
pub use ticker::Ticker;
