use crate::error::ExchangeError;
use crate::event::{Event, EventKind};
use crate::id::generate_local_id;
use crate::metric::Metrics;
use crate::port::{ExchangeClient, Timeframe};
use crate::rate_limit::RateLimiter;
use mm_instrument::{Balance, Market, Order, OrderId, OrderStatus, OrderType, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PURGE_AFTER_MS: i64 = 7 * 86_400_000;
const MARKET_SLIPPAGE: Decimal = dec!(0.01);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self { bids: Vec::new(), asks: Vec::new() }
    }

    fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.first().copied()
    }

    fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.first().copied()
    }

    fn second_best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.get(1).copied()
    }

    fn second_best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.get(1).copied()
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: i64,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub simulation: bool,
    pub fee: Decimal,
    pub fiat_currency: String,
    pub force_auto_cancel: bool,
    pub max_sync_age: i64,
    pub reserves: HashMap<String, Decimal>,
    pub min_deal_amounts: HashMap<Market, Decimal>,
    /// Minimum spacing between calls into the `ExchangeClient`. `0` disables
    /// throttling (the default for simulation and in tests).
    pub rate_limit_interval_ms: i64,
}

impl ExchangeConfig {
    pub fn reserve_of(&self, currency: &str) -> Decimal {
        self.reserves.get(currency).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Parameters for placing an order via [`ExchangeMirror::create_order`].
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub market: Market,
    pub order_type: OrderType,
    pub side: Side,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub auto_cancel: Option<i64>,
    pub auto_cancel_at_fill_percentage: Option<Decimal>,
    pub auto_cancel_at_price_level: Option<Decimal>,
    pub sticky: Option<bool>,
}

impl CreateOrderRequest {
    pub fn new(market: Market, order_type: OrderType, side: Side, amount: Decimal) -> Self {
        Self {
            market,
            order_type,
            side,
            amount,
            price: None,
            auto_cancel: None,
            auto_cancel_at_fill_percentage: None,
            auto_cancel_at_price_level: None,
            sticky: None,
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn sticky(mut self) -> Self {
        self.sticky = Some(true);
        self
    }

    pub fn with_auto_cancel(mut self, ms: i64) -> Self {
        self.auto_cancel = Some(ms);
        self
    }

    pub fn with_auto_cancel_at_fill_percentage(mut self, pct: Decimal) -> Self {
        self.auto_cancel_at_fill_percentage = Some(pct);
        self
    }
}

/// The local mirror of balances, orders, tickers, order books and trades for
/// one exchange account. The mirror is the single source of truth within a
/// single agent run — it is owned exclusively by the caller of that run and
/// is not safe to share across concurrent runs.
pub struct ExchangeMirror<C: ExchangeClient> {
    pub config: ExchangeConfig,
    client: Arc<C>,
    lockdown: bool,

    balances: HashMap<String, Balance>,
    open_orders: HashMap<OrderId, Order>,
    closed_orders: HashMap<OrderId, Order>,
    cancelled_orders: HashMap<OrderId, Order>,

    tickers: HashMap<Market, mm_instrument::Ticker>,
    order_books: HashMap<Market, OrderBook>,
    recent_trades: HashMap<Market, Vec<Trade>>,

    events: Vec<Event>,
    metrics: Metrics,
    rate_limiter: RateLimiter,
}

impl<C: ExchangeClient> ExchangeMirror<C> {
    pub fn new(config: ExchangeConfig, client: Arc<C>) -> Self {
        let rate_limiter = RateLimiter::new(Duration::from_millis(config.rate_limit_interval_ms.max(0) as u64));
        Self {
            config,
            client,
            lockdown: false,
            balances: HashMap::new(),
            open_orders: HashMap::new(),
            closed_orders: HashMap::new(),
            cancelled_orders: HashMap::new(),
            tickers: HashMap::new(),
            order_books: HashMap::new(),
            recent_trades: HashMap::new(),
            events: Vec::new(),
            metrics: Metrics::default(),
            rate_limiter,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn is_lockdown(&self) -> bool {
        self.lockdown
    }

    pub fn set_lockdown(&mut self, on: bool) {
        self.lockdown = on;
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Lets a caller outside the mirror (e.g. the drawdown guard's trip
    /// event) append to the append-only event log.
    pub fn record_event(&mut self, now: i64, kind: EventKind) {
        self.push_event(now, kind);
    }

    /// Appends to the event log and updates the matching counter, if any.
    fn push_event(&mut self, now: i64, kind: EventKind) {
        match &kind {
            EventKind::LimitOrderCreated { .. } | EventKind::MarketOrderCreated { .. } => {
                self.metrics.record_order_placed();
            }
            EventKind::LimitOrderCancelled { .. } | EventKind::MarketOrderCancelled { .. } => {
                self.metrics.record_order_cancelled();
            }
            EventKind::ReconciliationMismatch { .. } => {
                self.metrics.record_reconciliation_mismatch();
            }
            EventKind::MaxDrawdownReached { .. } => {
                self.metrics.record_drawdown_event();
            }
            EventKind::LimitOrderFulfilled { .. } => {}
        }
        self.events.push(Event::new(now, kind));
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.open_orders.values()
    }

    pub fn open_orders_for(&self, market: &Market) -> Vec<&Order> {
        self.open_orders.values().filter(|o| &o.market == market).collect()
    }

    pub fn balance(&self, currency: &str) -> Balance {
        self.balances.get(currency).copied().unwrap_or_else(Balance::zero)
    }

    pub fn ticker(&self, market: &Market) -> Option<&mm_instrument::Ticker> {
        self.tickers.get(market)
    }

    pub fn order_book(&self, market: &Market) -> Option<&OrderBook> {
        self.order_books.get(market)
    }

    pub fn last_closed_order(&self, market: &Market, side: Side) -> Option<&Order> {
        self.closed_orders
            .values()
            .filter(|o| &o.market == market && o.side == side)
            .max_by_key(|o| o.timestamp_closed.unwrap_or(o.created_at))
    }

    fn balance_mut(&mut self, currency: &str) -> &mut Balance {
        self.balances
            .entry(currency.to_string())
            .or_insert_with(Balance::zero)
    }

    // --- balance accounting primitives (private) ---

    fn deposit(&mut self, currency: &str, delta: Decimal) {
        let balance = self.balance_mut(currency);
        balance.set_raw_free(balance.raw_free() + delta);
    }

    fn withdraw(&mut self, currency: &str, delta: Decimal) {
        let balance = self.balance_mut(currency);
        balance.set_raw_free(balance.raw_free() - delta);
    }

    fn withdraw_from_used(&mut self, currency: &str, delta: Decimal) {
        let balance = self.balance_mut(currency);
        balance.used -= delta;
    }

    /// Clamps `delta` to `max(0, free - reserve_of(currency))`, moving the
    /// clamped amount from `free` to `used`. Returns the amount actually
    /// reserved.
    fn reserve(&mut self, currency: &str, delta: Decimal) -> Decimal {
        let reserve_floor = self.config.reserve_of(currency);
        let balance = self.balance(currency);
        let available = (balance.free() - reserve_floor).max(Decimal::ZERO);
        let actual = delta.min(available).max(Decimal::ZERO);

        let balance = self.balance_mut(currency);
        balance.set_raw_free(balance.raw_free() - actual);
        balance.used += actual;
        actual
    }

    /// Clamps `delta` to `used`, moving the clamped amount back to `free`.
    fn release(&mut self, currency: &str, delta: Decimal) -> Decimal {
        let balance = self.balance(currency);
        let actual = delta.min(balance.used).max(Decimal::ZERO);

        let balance = self.balance_mut(currency);
        balance.set_raw_free(balance.raw_free() + actual);
        balance.used -= actual;
        actual
    }

    // --- order placement / cancellation ---

    /// Places an order. Returns `Ok(None)` for soft rejections (insufficient
    /// amount/price, `force_auto_cancel` violated, live adapter error) and
    /// `Err(ExchangeError::Lockdown)` only for the hard lockdown rejection.
    pub async fn create_order(
        &mut self,
        now: i64,
        req: CreateOrderRequest,
    ) -> Result<Option<Order>, ExchangeError> {
        if self.lockdown {
            return Err(ExchangeError::Lockdown);
        }
        if self.config.force_auto_cancel && req.auto_cancel.is_none() {
            warn!(market = %req.market, "order rejected: force_auto_cancel set but no auto_cancel provided");
            return Ok(None);
        }

        let ticker = match self.tickers.get(&req.market) {
            Some(t) => *t,
            None => {
                warn!(market = %req.market, "order rejected: no ticker available to default price from");
                return Ok(None);
            }
        };

        let mut sticky = req.sticky.unwrap_or(false);
        if matches!(req.order_type, OrderType::Market) {
            sticky = false;
        }

        let mut price = req.price.unwrap_or(match req.side {
            Side::Buy => ticker.bid,
            Side::Sell => ticker.ask,
        });
        if matches!(req.order_type, OrderType::Market) {
            price = match req.side {
                Side::Buy => ticker.ask,
                Side::Sell => ticker.bid,
            };
        }

        if req.amount <= Decimal::ZERO || price <= Decimal::ZERO {
            return Ok(None);
        }

        let auto_cancel_at_fill_percentage = req.auto_cancel_at_fill_percentage.unwrap_or(Decimal::ONE);
        let auto_cancel_at_price_level = req.auto_cancel_at_price_level.unwrap_or(match req.side {
            Side::Buy => Decimal::MAX,
            Side::Sell => Decimal::ZERO,
        });

        let quote = req.market.quote().to_string();
        let base = req.market.base().to_string();

        let bounded_amount = match req.side {
            Side::Buy => {
                let quote_free = self.balance(&quote).free();
                (price * req.amount).min(quote_free) / price
            }
            Side::Sell => {
                let base_free = self.balance(&base).free();
                base_free.min(req.amount)
            }
        };

        if bounded_amount <= Decimal::ZERO {
            return Ok(None);
        }

        let mut order = Order::new_open(
            generate_local_id(),
            now,
            req.market.clone(),
            req.order_type,
            req.side,
            price,
            bounded_amount,
            req.auto_cancel,
            auto_cancel_at_fill_percentage,
            auto_cancel_at_price_level,
            sticky,
        );

        match (req.order_type, req.side) {
            (OrderType::Limit, Side::Buy) => {
                self.reserve(&quote, bounded_amount * price);
            }
            (OrderType::Market, Side::Buy) => {
                self.withdraw(&quote, bounded_amount * price);
                let credited = bounded_amount * (Decimal::ONE - self.config.fee) * (Decimal::ONE - MARKET_SLIPPAGE);
                self.deposit(&base, credited);
            }
            (OrderType::Limit, Side::Sell) => {
                self.reserve(&base, bounded_amount);
            }
            (OrderType::Market, Side::Sell) => {
                self.withdraw(&base, bounded_amount);
                let credited =
                    bounded_amount * price * (Decimal::ONE - self.config.fee) * (Decimal::ONE - MARKET_SLIPPAGE);
                self.deposit(&quote, credited);
            }
        }

        if !self.config.simulation {
            self.rate_limiter.acquire().await;
            match self
                .client
                .create_order(&req.market, req.order_type, req.side, bounded_amount, Some(price))
                .await
            {
                Ok(remote_id) => order.id = remote_id,
                Err(err) => {
                    warn!(market = %req.market, error = %err, "live create_order failed");
                    return Ok(None);
                }
            }
        }

        let kind = match req.order_type {
            OrderType::Limit => EventKind::LimitOrderCreated {
                order_id: order.id.clone(),
                market: order.market.clone(),
            },
            OrderType::Market => EventKind::MarketOrderCreated {
                order_id: order.id.clone(),
                market: order.market.clone(),
            },
        };
        self.push_event(now, kind);
        info!(order_id = %order.id, market = %order.market, side = ?order.side, "order created");

        match req.order_type {
            OrderType::Market => {
                let mut closed = order.clone();
                closed.close(now, closed.amount);
                self.closed_orders.insert(closed.id.clone(), closed.clone());
                Ok(Some(closed))
            }
            OrderType::Limit => {
                self.open_orders.insert(order.id.clone(), order.clone());
                Ok(Some(order))
            }
        }
    }

    pub async fn cancel_order(&mut self, now: i64, id: &OrderId) -> Result<(), ExchangeError> {
        if self.lockdown {
            return Err(ExchangeError::Lockdown);
        }
        let order = self
            .open_orders
            .get(id)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound(id.clone()))?;
        if !order.is_open() {
            return Ok(());
        }

        if !self.config.simulation {
            self.rate_limiter.acquire().await;
            if let Err(err) = self.client.cancel_order(&order).await {
                warn!(order_id = %id, error = %err, "live cancel_order failed, leaving local state untouched");
                return Ok(());
            }
        }

        let currency = match order.side {
            Side::Buy => order.market.quote().to_string(),
            Side::Sell => order.market.base().to_string(),
        };
        let release_amount = match order.side {
            Side::Buy => order.remaining * order.price,
            Side::Sell => order.remaining,
        };
        self.release(&currency, release_amount);

        let mut cancelled = order.clone();
        cancelled.status = OrderStatus::Closed;
        cancelled.timestamp_closed = Some(now);
        self.open_orders.remove(id);

        if cancelled.filled > Decimal::ZERO {
            self.closed_orders.insert(id.clone(), cancelled.clone());
        }
        self.cancelled_orders.insert(id.clone(), cancelled);

        let kind = match order.order_type {
            OrderType::Limit => EventKind::LimitOrderCancelled {
                order_id: id.clone(),
                market: order.market.clone(),
            },
            OrderType::Market => EventKind::MarketOrderCancelled {
                order_id: id.clone(),
                market: order.market.clone(),
            },
        };
        self.push_event(now, kind);
        info!(order_id = %id, "order cancelled");
        Ok(())
    }

    /// Cancels every open order matching `market`/`side`. Individual
    /// failures are reported per-id, not fatal to the batch.
    pub async fn cancel_all_orders(
        &mut self,
        now: i64,
        market: Option<&Market>,
        side: Option<Side>,
    ) -> Vec<(OrderId, Result<(), ExchangeError>)> {
        let ids: Vec<OrderId> = self
            .open_orders
            .values()
            .filter(|o| market.map_or(true, |m| &o.market == m) && side.map_or(true, |s| o.side == s))
            .map(|o| o.id.clone())
            .collect();

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.cancel_order(now, &id).await;
            results.push((id, result));
        }
        results
    }

    /// Removes a previously cancelled order from the cancelled-orders map,
    /// used by sticky repricing: cancelling to replace is not a genuine
    /// cancellation.
    fn unmark_cancelled(&mut self, id: &OrderId) {
        self.cancelled_orders.remove(id);
    }

    // --- reconciliation cycle ---

    /// The full reconciliation cycle: `sync_orders` → (simulation)
    /// `fulfill_limit_orders` → `auto_cancel_orders` → `update_sticky_orders`
    /// → `purge_order_list`, in that order.
    pub async fn update(&mut self, now: i64, market: Option<&Market>) -> Result<bool, ExchangeError> {
        if self.lockdown {
            return Ok(false);
        }

        match self.sync_orders(now, market).await {
            Ok(()) => {}
            Err(ExchangeError::ReconciliationMismatch { market, local, remote }) => {
                warn!(%market, local, remote, "reconciliation mismatch, aborting tick for market");
                self.push_event(
                    now,
                    EventKind::ReconciliationMismatch {
                        market: market.parse().unwrap_or_else(|_| Market::new("", "")),
                        local,
                        remote,
                    },
                );
                return Ok(false);
            }
            Err(err) => return Err(err),
        }

        if self.config.simulation {
            self.fulfill_limit_orders(now, market).await;
        }

        self.auto_cancel_orders(now, market).await;
        self.update_sticky_orders(now, market).await;
        self.purge_order_list(now, market);

        Ok(true)
    }

    async fn sync_orders(&mut self, now: i64, market: Option<&Market>) -> Result<(), ExchangeError> {
        if self.config.simulation {
            return Ok(());
        }

        self.rate_limiter.acquire().await;
        let remote = self.client.fetch_open_orders(market).await?;
        let remote_ids: std::collections::HashSet<OrderId> = remote.iter().map(|o| o.id.clone()).collect();

        let local_ids: Vec<OrderId> = self
            .open_orders
            .values()
            .filter(|o| market.map_or(true, |m| &o.market == m))
            .map(|o| o.id.clone())
            .collect();

        for id in local_ids {
            if !remote_ids.contains(&id) {
                if !self.cancelled_orders.contains_key(&id) {
                    if let Some(mut order) = self.open_orders.remove(&id) {
                        let amount = order.amount;
                        order.close(now, amount);
                        self.closed_orders.insert(id.clone(), order.clone());
                        self.push_event(
                            now,
                            EventKind::LimitOrderFulfilled {
                                order_id: id,
                                market: order.market,
                            },
                        );
                    }
                }
            } else if let Some(r) = remote.iter().find(|r| r.id == id) {
                if let Some(local) = self.open_orders.get_mut(&id) {
                    local.status = r.status;
                    local.filled = r.filled;
                    local.remaining = r.remaining;
                    local.fee = r.fee;
                }
            }
        }

        for r in &remote {
            if !self.open_orders.contains_key(&r.id) {
                if let Some(mut restored) = self.closed_orders.remove(&r.id) {
                    restored.status = OrderStatus::Open;
                    restored.timestamp_closed = None;
                    self.open_orders.insert(r.id.clone(), restored);
                } else if self.config.force_auto_cancel {
                    self.rate_limiter.acquire().await;
                    if let Err(err) = self.client.cancel_order(r).await {
                        warn!(order_id = %r.id, error = %err, "failed to force-cancel unknown remote order");
                    }
                } else {
                    self.open_orders.insert(r.id.clone(), r.clone());
                }
            }
        }

        let local_count = self
            .open_orders
            .values()
            .filter(|o| market.map_or(true, |m| &o.market == m))
            .count();
        if local_count != remote.len() {
            return Err(ExchangeError::ReconciliationMismatch {
                market: market.map(|m| m.to_string()).unwrap_or_default(),
                local: local_count,
                remote: remote.len(),
            });
        }

        Ok(())
    }

    async fn fulfill_limit_orders(&mut self, now: i64, market: Option<&Market>) {
        let ids: Vec<OrderId> = self
            .open_orders
            .values()
            .filter(|o| {
                matches!(o.order_type, OrderType::Limit) && market.map_or(true, |m| &o.market == m)
            })
            .map(|o| o.id.clone())
            .collect();

        for id in ids {
            let order = match self.open_orders.get(&id) {
                Some(o) => o.clone(),
                None => continue,
            };

            let candles = match self
                .client
                .fetch_ohlcv(&order.market, Timeframe::OneMin, None, Some(1))
                .await
            {
                Some(c) => c,
                None => continue,
            };
            let candle = match candles.last() {
                Some(c) => *c,
                None => continue,
            };

            if order.created_at >= candle.timestamp || candle.volume <= Decimal::ZERO {
                continue;
            }

            let fills = match order.side {
                Side::Buy => candle.low < order.price,
                Side::Sell => candle.high > order.price,
            };
            if !fills {
                continue;
            }

            let base = order.market.base().to_string();
            let quote = order.market.quote().to_string();
            match order.side {
                Side::Buy => {
                    self.withdraw_from_used(&quote, order.amount * order.price);
                    let credited = order.amount * (Decimal::ONE - self.config.fee);
                    self.deposit(&base, credited);
                }
                Side::Sell => {
                    self.withdraw_from_used(&base, order.amount);
                    let credited = order.amount * order.price * (Decimal::ONE - self.config.fee);
                    self.deposit(&quote, credited);
                }
            }

            if let Some(mut order) = self.open_orders.remove(&id) {
                order.close(now, order.amount);
                self.closed_orders.insert(id.clone(), order);
            }
            self.push_event(
                now,
                EventKind::LimitOrderFulfilled {
                    order_id: id,
                    market: order.market,
                },
            );
        }
    }

    async fn auto_cancel_orders(&mut self, now: i64, market: Option<&Market>) {
        let ids: Vec<OrderId> = self
            .open_orders
            .values()
            .filter(|o| market.map_or(true, |m| &o.market == m))
            .filter(|o| self.should_auto_cancel(o, now))
            .map(|o| o.id.clone())
            .collect();

        for id in ids {
            let _ = self.cancel_order(now, &id).await;
        }
    }

    fn should_auto_cancel(&self, order: &Order, now: i64) -> bool {
        if let Some(auto_cancel) = order.auto_cancel {
            if now - order.created_at > auto_cancel {
                return true;
            }
        }
        if order.fill_percentage() >= order.auto_cancel_at_fill_percentage {
            return true;
        }
        if let Some(ticker) = self.tickers.get(&order.market) {
            match order.side {
                Side::Buy => {
                    if ticker.ask > order.auto_cancel_at_price_level {
                        return true;
                    }
                }
                Side::Sell => {
                    if ticker.bid < order.auto_cancel_at_price_level {
                        return true;
                    }
                }
            }
        }
        false
    }

    async fn update_sticky_orders(&mut self, now: i64, market: Option<&Market>) {
        let ids: Vec<OrderId> = self
            .open_orders
            .values()
            .filter(|o| o.sticky && market.map_or(true, |m| &o.market == m))
            .map(|o| o.id.clone())
            .collect();

        for id in ids {
            let order = match self.open_orders.get(&id) {
                Some(o) => o.clone(),
                None => continue,
            };

            let _ = self.sync_order_book(&[order.market.clone()]).await;
            let book = match self.order_books.get(&order.market) {
                Some(b) => *b,
                None => continue,
            };

            let target = match order.side {
                Side::Buy => match book.best_bid() {
                    Some((price, amount)) if order.remaining >= amount && order.price == price => {
                        book.second_best_bid().map(|(p, _)| p).unwrap_or(price)
                    }
                    Some((price, _)) => price,
                    None => continue,
                },
                Side::Sell => match book.best_ask() {
                    Some((price, amount)) if order.remaining >= amount && order.price == price => {
                        book.second_best_ask().map(|(p, _)| p).unwrap_or(price)
                    }
                    Some((price, _)) => price,
                    None => continue,
                },
            };

            if target == order.price {
                continue;
            }

            if self.cancel_order(now, &id).await.is_err() {
                continue;
            }
            self.unmark_cancelled(&id);

            let min_deal = self
                .config
                .min_deal_amounts
                .get(&order.market)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let remaining = order.remaining;
            if remaining <= min_deal {
                continue;
            }
            if let Some(auto_cancel) = order.auto_cancel {
                if now - order.created_at >= auto_cancel {
                    continue;
                }
            }

            let request = CreateOrderRequest {
                market: order.market.clone(),
                order_type: OrderType::Limit,
                side: order.side,
                amount: remaining,
                price: Some(target),
                auto_cancel: order.auto_cancel,
                auto_cancel_at_fill_percentage: Some(order.auto_cancel_at_fill_percentage),
                auto_cancel_at_price_level: Some(order.auto_cancel_at_price_level),
                sticky: Some(true),
            };
            let _ = self.create_order(now, request).await;
        }
    }

    fn purge_order_list(&mut self, now: i64, market: Option<&Market>) {
        let cutoff = now - PURGE_AFTER_MS;
        self.closed_orders.retain(|_, o| {
            (market.map_or(false, |m| &o.market != m)) || o.timestamp_closed.unwrap_or(o.created_at) > cutoff
        });
        self.cancelled_orders.retain(|_, o| {
            (market.map_or(false, |m| &o.market != m)) || o.timestamp_closed.unwrap_or(o.created_at) > cutoff
        });
    }

    // --- sync* (remote → local merge) ---

    pub async fn sync_balance(&mut self) -> bool {
        self.rate_limiter.acquire().await;
        match self.client.fetch_balance().await {
            Ok(remote) => {
                for (currency, (free, used)) in remote {
                    let balance = self.balance_mut(&currency);
                    balance.set_raw_free(free);
                    balance.used = used;
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "sync_balance failed");
                false
            }
        }
    }

    pub async fn sync_tickers(&mut self, markets: Option<&[Market]>) -> bool {
        self.rate_limiter.acquire().await;
        match self.client.fetch_tickers(markets).await {
            Ok(remote) => {
                self.tickers.extend(remote);
                true
            }
            Err(err) => {
                warn!(error = %err, "sync_tickers failed");
                false
            }
        }
    }

    pub async fn sync_order_book(&mut self, markets: &[Market]) -> bool {
        self.rate_limiter.acquire().await;
        match self.client.fetch_order_book(markets, None).await {
            Ok(remote) => {
                self.order_books.extend(remote);
                true
            }
            Err(err) => {
                warn!(error = %err, "sync_order_book failed");
                false
            }
        }
    }

    pub async fn sync_trades(&mut self, markets: &[Market]) -> bool {
        self.rate_limiter.acquire().await;
        match self.client.fetch_trades(markets, None, None).await {
            Ok(remote) => {
                for (market, trades) in remote {
                    self.recent_trades.entry(market).or_default().extend(trades);
                }
                true
            }
            Err(err) => {
                warn!(error = %err, "sync_trades failed");
                false
            }
        }
    }

    pub fn recent_trades(&self, market: &Market) -> &[Trade] {
        self.recent_trades.get(market).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Converts every currency with a nonzero total to `fiat_currency` via
    /// the `base/fiat` ticker (1:1 if `currency == fiat_currency`).
    pub fn get_total_balance(&self, include_reserve: bool, currencies: Option<&[String]>) -> Option<Decimal> {
        let mut total = Decimal::ZERO;
        for (currency, balance) in &self.balances {
            if let Some(filter) = currencies {
                if !filter.iter().any(|c| c == currency) {
                    continue;
                }
            }

            let gross = if include_reserve {
                balance.total()
            } else {
                (balance.total() - self.config.reserve_of(currency)).max(Decimal::ZERO)
            };
            if gross.is_zero() {
                continue;
            }

            if currency == &self.config.fiat_currency {
                total += gross;
                continue;
            }

            let market = Market::new(currency.clone(), self.config.fiat_currency.clone());
            match self.tickers.get(&market) {
                Some(ticker) => total += gross * ticker.bid,
                None => return None,
            }
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortError;
    use mm_instrument::{Candle, Ticker};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockClient {
        cancelled: Mutex<Vec<OrderId>>,
    }

    #[async_trait::async_trait]
    impl ExchangeClient for MockClient {
        async fn load_markets(&self) -> Result<(), PortError> {
            Ok(())
        }

        async fn get_markets(&self, _fiat: Option<&str>) -> Result<Vec<Market>, PortError> {
            Ok(vec![])
        }

        async fn get_min_deal_amount(&self, _market: &Market) -> Result<Decimal, PortError> {
            Ok(Decimal::ZERO)
        }

        async fn fetch_balance(&self) -> Result<HashMap<String, (Decimal, Decimal)>, PortError> {
            Ok(HashMap::new())
        }

        async fn fetch_tickers(&self, _markets: Option<&[Market]>) -> Result<HashMap<Market, Ticker>, PortError> {
            Ok(HashMap::new())
        }

        async fn fetch_order_book(
            &self,
            _markets: &[Market],
            _depth: Option<usize>,
        ) -> Result<HashMap<Market, OrderBook>, PortError> {
            Ok(HashMap::new())
        }

        async fn fetch_trades(
            &self,
            _markets: &[Market],
            _since: Option<i64>,
            _limit: Option<usize>,
        ) -> Result<HashMap<Market, Vec<Trade>>, PortError> {
            Ok(HashMap::new())
        }

        async fn fetch_open_orders(&self, _market: Option<&Market>) -> Result<Vec<Order>, PortError> {
            Ok(vec![])
        }

        async fn fetch_ohlcv(
            &self,
            _market: &Market,
            _timeframe: Timeframe,
            _since: Option<i64>,
            _limit: Option<usize>,
        ) -> Option<Vec<Candle>> {
            None
        }

        async fn create_order(
            &self,
            _market: &Market,
            _order_type: OrderType,
            _side: Side,
            _amount: Decimal,
            _price: Option<Decimal>,
        ) -> Result<OrderId, PortError> {
            Ok("remote-id".to_string())
        }

        async fn cancel_order(&self, order: &Order) -> Result<(), PortError> {
            self.cancelled.lock().unwrap().push(order.id.clone());
            Ok(())
        }
    }

    fn config() -> ExchangeConfig {
        ExchangeConfig {
            simulation: true,
            fee: dec!(0.001),
            fiat_currency: "USDT".to_string(),
            force_auto_cancel: false,
            max_sync_age: 60_000,
            reserves: HashMap::new(),
            min_deal_amounts: HashMap::new(),
            rate_limit_interval_ms: 0,
        }
    }

    fn mirror() -> ExchangeMirror<MockClient> {
        let mut m = ExchangeMirror::new(config(), Arc::new(MockClient::default()));
        m.deposit("USDT", dec!(1000));
        m.deposit("BTC", dec!(1));
        m.tickers.insert(
            "BTC/USDT".parse().unwrap(),
            Ticker::new(0, dec!(100), dec!(101), dec!(100), dec!(0), dec!(0)),
        );
        m
    }

    #[tokio::test]
    async fn limit_buy_reserves_quote_and_round_trips_on_cancel() {
        let mut m = mirror();
        let market: Market = "BTC/USDT".parse().unwrap();
        let before_free = m.balance("USDT").free();

        let order = m
            .create_order(0, CreateOrderRequest::new(market, OrderType::Limit, Side::Buy, dec!(1)).with_price(dec!(100)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(m.balance("USDT").used, dec!(100));
        assert_eq!(m.balance("USDT").free(), before_free - dec!(100));

        m.cancel_order(1, &order.id).await.unwrap();
        assert_eq!(m.balance("USDT").used, Decimal::ZERO);
        assert_eq!(m.balance("USDT").free(), before_free);
    }

    #[tokio::test]
    async fn market_sell_credits_quote_immediately() {
        let mut m = mirror();
        let market: Market = "BTC/USDT".parse().unwrap();
        let quote_before = m.balance("USDT").free();

        let order = m
            .create_order(0, CreateOrderRequest::new(market, OrderType::Market, Side::Sell, dec!(1)))
            .await
            .unwrap()
            .unwrap();

        assert!(!order.is_open());
        assert_eq!(m.balance("BTC").free(), Decimal::ZERO);
        assert!(m.balance("USDT").free() > quote_before);
    }

    #[tokio::test]
    async fn lockdown_rejects_mutation() {
        let mut m = mirror();
        m.set_lockdown(true);
        let market: Market = "BTC/USDT".parse().unwrap();
        let result = m
            .create_order(0, CreateOrderRequest::new(market, OrderType::Limit, Side::Buy, dec!(1)).with_price(dec!(100)))
            .await;
        assert!(matches!(result, Err(ExchangeError::Lockdown)));
    }

    #[test]
    fn total_balance_converts_via_fiat_ticker() {
        let m = mirror();
        let total = m.get_total_balance(true, None).unwrap();
        assert_eq!(total, dec!(1000) + dec!(1) * dec!(100));
    }

    #[test]
    fn total_balance_none_when_ticker_missing() {
        let mut m = mirror();
        m.deposit("ETH", dec!(5));
        assert!(m.get_total_balance(true, None).is_none());
    }

    #[derive(Default)]
    struct RemoteOrdersClient {
        remote: Mutex<Vec<Order>>,
        cancelled: Mutex<Vec<OrderId>>,
    }

    #[async_trait::async_trait]
    impl ExchangeClient for RemoteOrdersClient {
        async fn load_markets(&self) -> Result<(), PortError> {
            Ok(())
        }

        async fn get_markets(&self, _fiat: Option<&str>) -> Result<Vec<Market>, PortError> {
            Ok(vec![])
        }

        async fn get_min_deal_amount(&self, _market: &Market) -> Result<Decimal, PortError> {
            Ok(Decimal::ZERO)
        }

        async fn fetch_balance(&self) -> Result<HashMap<String, (Decimal, Decimal)>, PortError> {
            Ok(HashMap::new())
        }

        async fn fetch_tickers(&self, _markets: Option<&[Market]>) -> Result<HashMap<Market, Ticker>, PortError> {
            Ok(HashMap::new())
        }

        async fn fetch_order_book(
            &self,
            _markets: &[Market],
            _depth: Option<usize>,
        ) -> Result<HashMap<Market, OrderBook>, PortError> {
            Ok(HashMap::new())
        }

        async fn fetch_trades(
            &self,
            _markets: &[Market],
            _since: Option<i64>,
            _limit: Option<usize>,
        ) -> Result<HashMap<Market, Vec<Trade>>, PortError> {
            Ok(HashMap::new())
        }

        async fn fetch_open_orders(&self, market: Option<&Market>) -> Result<Vec<Order>, PortError> {
            Ok(self
                .remote
                .lock()
                .unwrap()
                .iter()
                .filter(|o| market.map_or(true, |m| &o.market == m))
                .cloned()
                .collect())
        }

        async fn fetch_ohlcv(
            &self,
            _market: &Market,
            _timeframe: Timeframe,
            _since: Option<i64>,
            _limit: Option<usize>,
        ) -> Option<Vec<Candle>> {
            None
        }

        async fn create_order(
            &self,
            _market: &Market,
            _order_type: OrderType,
            _side: Side,
            _amount: Decimal,
            _price: Option<Decimal>,
        ) -> Result<OrderId, PortError> {
            Ok("remote-id".to_string())
        }

        async fn cancel_order(&self, order: &Order) -> Result<(), PortError> {
            self.cancelled.lock().unwrap().push(order.id.clone());
            Ok(())
        }
    }

    fn non_simulation_config() -> ExchangeConfig {
        ExchangeConfig {
            simulation: false,
            fee: dec!(0.001),
            fiat_currency: "USDT".to_string(),
            force_auto_cancel: false,
            max_sync_age: 60_000,
            reserves: HashMap::new(),
            min_deal_amounts: HashMap::new(),
            rate_limit_interval_ms: 0,
        }
    }

    /// A remote order the mirror has no local provenance for must be kept
    /// open ("insert into openOrders as-is"), not inserted then immediately
    /// cancelled, and must not trip a reconciliation mismatch — running
    /// `update` twice against an unchanged remote must yield identical state.
    #[tokio::test]
    async fn freshly_discovered_remote_order_is_kept_open_not_cancelled() {
        let market: Market = "BTC/USDT".parse().unwrap();
        let remote_order = Order::new_open(
            "remote-1".to_string(),
            0,
            market.clone(),
            OrderType::Limit,
            Side::Buy,
            dec!(100),
            dec!(1),
            None,
            Decimal::ZERO,
            Decimal::ZERO,
            false,
        );
        let client = RemoteOrdersClient {
            remote: Mutex::new(vec![remote_order]),
            cancelled: Mutex::new(Vec::new()),
        };
        let mut m = ExchangeMirror::new(non_simulation_config(), Arc::new(client));

        let ok = m.update(0, Some(&market)).await.unwrap();
        assert!(ok, "first sync should succeed without a reconciliation mismatch");
        assert!(m.open_orders.contains_key("remote-1"));
        assert!(m.client.cancelled.lock().unwrap().is_empty());

        // Second sync against an unchanged remote must be a no-op.
        let ok = m.update(1, Some(&market)).await.unwrap();
        assert!(ok, "repeat sync against unchanged remote must not mismatch");
        assert!(m.open_orders.contains_key("remote-1"));
        assert!(m.client.cancelled.lock().unwrap().is_empty());
        assert_eq!(m.metrics().reconciliation_mismatches, 0);
    }

    #[tokio::test]
    async fn metrics_count_orders_placed_and_cancelled() {
        let mut m = mirror();
        let market: Market = "BTC/USDT".parse().unwrap();

        let order = m
            .create_order(0, CreateOrderRequest::new(market, OrderType::Limit, Side::Buy, dec!(1)).with_price(dec!(100)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m.metrics().orders_placed, 1);
        assert_eq!(m.metrics().orders_cancelled, 0);

        m.cancel_order(1, &order.id).await.unwrap();
        assert_eq!(m.metrics().orders_placed, 1);
        assert_eq!(m.metrics().orders_cancelled, 1);
    }
}
