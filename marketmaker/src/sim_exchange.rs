//! A self-contained simulated [`ExchangeClient`] used when no concrete venue
//! adapter is configured. Grounded on `aibysid-HyperLiquidMM`'s `SimExchange`
//! (a synthetic in-memory venue standing in for a real one in shadow mode),
//! restricted here to market-data synthesis: order placement against this
//! client is never exercised by the mirror while `ExchangeConfig::simulation`
//! is true.

use async_trait::async_trait;
use mm_core::gaussian;
use mm_exchange::{ExchangeClient, OrderBook, PortError, Timeframe, Trade};
use mm_instrument::{Candle, Market, Order, OrderId, OrderType, Side, Ticker};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

fn timeframe_ms(timeframe: Timeframe) -> i64 {
    match timeframe {
        Timeframe::OneMin => 60_000,
        Timeframe::FifteenMin => 900_000,
        Timeframe::OneHour => 3_600_000,
        Timeframe::OneDay => 86_400_000,
    }
}

/// Synthesizes a plausible-looking random-walk OHLCV series ending "now",
/// seeded by the market's starting price.
pub struct SimExchange {
    markets: Vec<Market>,
    starting_price: HashMap<Market, f64>,
    min_deal_amount: Decimal,
    now: Mutex<i64>,
}

impl SimExchange {
    pub fn new(markets: Vec<Market>, starting_price: f64, min_deal_amount: Decimal, now: i64) -> Self {
        let starting_price = markets.iter().map(|m| (m.clone(), starting_price)).collect();
        Self {
            markets,
            starting_price,
            min_deal_amount,
            now: Mutex::new(now),
        }
    }

    fn price_at(&self, market: &Market, now: i64) -> f64 {
        *self.starting_price.get(market).unwrap_or(&100.0) * (1.0 + (now % 1000) as f64 / 100_000.0)
    }

    fn synth_candles(&self, market: &Market, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        let step = timeframe_ms(timeframe);
        let now = *self.now.lock().unwrap();
        let mut price = self.price_at(market, now - step * limit as i64);
        let mut candles = Vec::with_capacity(limit);

        for i in 0..limit {
            let timestamp = now - step * (limit - i) as i64;
            let open = price;
            let drift = gaussian(0.0, 0.003, 6);
            let close = (open * (1.0 + drift)).max(0.01);
            let high = open.max(close) * 1.001;
            let low = open.min(close) * 0.999;
            let volume = 10.0 + gaussian(0.0, 2.0, 6).abs();

            candles.push(Candle::new(
                timestamp,
                Decimal::from_f64_retain(open).unwrap_or_default(),
                Decimal::from_f64_retain(high).unwrap_or_default(),
                Decimal::from_f64_retain(low).unwrap_or_default(),
                Decimal::from_f64_retain(close).unwrap_or_default(),
                Decimal::from_f64_retain(volume).unwrap_or_default(),
            ));
            price = close;
        }
        candles
    }
}

#[async_trait]
impl ExchangeClient for SimExchange {
    async fn load_markets(&self) -> Result<(), PortError> {
        Ok(())
    }

    async fn get_markets(&self, _fiat: Option<&str>) -> Result<Vec<Market>, PortError> {
        Ok(self.markets.clone())
    }

    async fn get_min_deal_amount(&self, _market: &Market) -> Result<Decimal, PortError> {
        Ok(self.min_deal_amount)
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, (Decimal, Decimal)>, PortError> {
        Ok(HashMap::new())
    }

    async fn fetch_tickers(&self, markets: Option<&[Market]>) -> Result<HashMap<Market, Ticker>, PortError> {
        let now = *self.now.lock().unwrap();
        let targets: Vec<Market> = markets.map(|m| m.to_vec()).unwrap_or_else(|| self.markets.clone());
        Ok(targets
            .into_iter()
            .map(|market| {
                let price = self.price_at(&market, now);
                let bid = Decimal::from_f64_retain(price * 0.999).unwrap_or_default();
                let ask = Decimal::from_f64_retain(price * 1.001).unwrap_or_default();
                let last = Decimal::from_f64_retain(price).unwrap_or_default();
                let ticker = Ticker::new(now, bid, ask, last, Decimal::from(1000), last * Decimal::from(1000));
                (market, ticker)
            })
            .collect())
    }

    async fn fetch_order_book(&self, markets: &[Market], _depth: Option<usize>) -> Result<HashMap<Market, OrderBook>, PortError> {
        let now = *self.now.lock().unwrap();
        Ok(markets
            .iter()
            .map(|market| {
                let price = self.price_at(market, now);
                let bid = Decimal::from_f64_retain(price * 0.999).unwrap_or_default();
                let ask = Decimal::from_f64_retain(price * 1.001).unwrap_or_default();
                let book = OrderBook {
                    bids: vec![(bid, Decimal::from(1))],
                    asks: vec![(ask, Decimal::from(1))],
                };
                (market.clone(), book)
            })
            .collect())
    }

    async fn fetch_trades(&self, markets: &[Market], _since: Option<i64>, _limit: Option<usize>) -> Result<HashMap<Market, Vec<Trade>>, PortError> {
        Ok(markets.iter().map(|market| (market.clone(), Vec::new())).collect())
    }

    async fn fetch_open_orders(&self, _market: Option<&Market>) -> Result<Vec<Order>, PortError> {
        Ok(Vec::new())
    }

    async fn fetch_ohlcv(&self, market: &Market, timeframe: Timeframe, _since: Option<i64>, limit: Option<usize>) -> Option<Vec<Candle>> {
        Some(self.synth_candles(market, timeframe, limit.unwrap_or(1)))
    }

    async fn create_order(&self, _market: &Market, _order_type: OrderType, _side: Side, _amount: Decimal, _price: Option<Decimal>) -> Result<OrderId, PortError> {
        Ok(mm_core::random_between(0.0, 1.0).to_bits().to_string())
    }

    async fn cancel_order(&self, _order: &Order) -> Result<(), PortError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn synthesizes_the_requested_candle_count() {
        let market = Market::new("BTC", "USDT");
        let exchange = SimExchange::new(vec![market.clone()], 100.0, Decimal::from(1), 1_000_000_000);
        let candles = exchange.fetch_ohlcv(&market, Timeframe::OneHour, None, Some(24 * 7)).await.unwrap();
        assert_eq!(candles.len(), 24 * 7);
    }
}
