//! Trading agent: owns the active-market set and per-market state, and
//! dispatches each tick through Entry → MarketMaker → Exit. Grounded on
//! the legacy `src/engine/trader.rs` `Trader`/`TraderBuilder` shape, with
//! the drawdown guard wired in from `jackbot-risk::drawdown`.

use crate::entry::{self, EntryContext, EntryDecision, EntryInputs, EntryOptions};
use crate::exit::{self, ExitContext, ExitDecision, ExitInputs, ExitOptions};
use crate::market_maker::{self, MarketMakerInputs, MarketMakerOptions};
use mm_exchange::{CreateOrderRequest, ExchangeClient, ExchangeMirror};
use mm_instrument::{Candle, Market, OrderType, Side};
use mm_quant::{compute_gbm_parameters, compute_market_dynamics_parameters, GbmParameters, MarketDynamicsParameters};
use mm_risk::DrawdownGuard;
use mm_ta::{ema, rsi, tail, vdx};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    TryingToEnter,
    HasPosition,
    TryingToLeave,
}

#[derive(Debug, Clone)]
pub struct MarketState {
    pub ratio: Decimal,
    pub entry_price: Option<Decimal>,
    pub entry_timestamp: Option<i64>,
    pub agent_state: AgentState,
    pub trend: Option<Decimal>,
    pub price_level: Option<Decimal>,
    pub can_trade: bool,
    pub gbm: Option<GbmParameters>,
    pub dynamics: Option<MarketDynamicsParameters>,
    pub last_quote_refresh: Option<i64>,
}

impl MarketState {
    pub fn new(can_trade: bool) -> Self {
        Self {
            ratio: Decimal::ZERO,
            entry_price: None,
            entry_timestamp: None,
            agent_state: AgentState::Idle,
            trend: None,
            price_level: None,
            can_trade,
            gbm: None,
            dynamics: None,
            last_quote_refresh: None,
        }
    }
}

pub struct AgentOptions {
    pub minimum_trend: Decimal,
    pub maximum_price_level: Decimal,
    pub fiat_ratio: Decimal,
    pub max_drawdown: Decimal,
    pub entry: EntryOptions,
    pub exit: ExitOptions,
    pub market_maker: MarketMakerOptions,
}

/// Per-market candle feeds the agent needs to evaluate a tick; supplied by
/// the caller (the mm-exchange client sits behind the mirror).
pub struct MarketCandles {
    pub day: Vec<Candle>,
    pub hour: Vec<Candle>,
    pub fifteen_min: Vec<Candle>,
}

pub struct TradingAgent {
    pub options: AgentOptions,
    pub market_states: HashMap<Market, MarketState>,
    pub drawdown: DrawdownGuard,
}

impl TradingAgent {
    pub fn new(options: AgentOptions) -> Self {
        let max_drawdown = options.max_drawdown;
        Self {
            options,
            market_states: HashMap::new(),
            drawdown: DrawdownGuard::new(max_drawdown),
        }
    }

    pub fn paused(&self) -> bool {
        self.drawdown.paused()
    }

    /// Recomputes trend/price-level for every market whose settings allow
    /// trading, initializing state for newly eligible markets.
    pub fn before_run(&mut self, universe: &HashMap<Market, (bool, Vec<Candle>)>) {
        for (market, (can_trade, day_candles)) in universe {
            let already_active = self.market_states.contains_key(market);
            if !*can_trade && !already_active {
                continue;
            }

            let state = self.market_states.entry(market.clone()).or_insert_with(|| MarketState::new(*can_trade));
            state.can_trade = *can_trade;

            if state.trend.is_none() || state.price_level.is_none() {
                let trend = tail(&vdx(day_candles, 30)).unwrap_or(Decimal::ZERO);
                let price_level = tail(&rsi(day_candles, 20)).unwrap_or(Decimal::ZERO) / Decimal::from(100);
                state.trend = Some(trend);
                state.price_level = Some(price_level);
            }

            let meets_threshold = state.trend.unwrap_or(Decimal::ZERO) >= self.options.minimum_trend
                && state.price_level.unwrap_or(Decimal::ONE) < self.options.maximum_price_level;
            if !meets_threshold && !already_active {
                self.market_states.remove(market);
            }
        }
    }

    /// A market stays active while `can_trade` or it still holds a
    /// meaningful base balance or has open orders.
    pub fn active_markets(&self) -> impl Iterator<Item = &Market> {
        self.market_states.keys()
    }

    pub fn drop_inactive(&mut self, market: &Market, base_total: Decimal, min_deal_amount: Decimal, open_order_count: usize) {
        let keep = self
            .market_states
            .get(market)
            .map(|s| s.can_trade)
            .unwrap_or(false)
            || base_total >= min_deal_amount
            || open_order_count > 0;
        if !keep {
            self.market_states.remove(market);
        }
    }

    /// Runs one tick for `market`. Requires the mirror to already be
    /// synced for this market (the caller calls `ExchangeMirror::update`
    /// beforehand when `agent_state != Idle`).
    pub async fn run_for_market<C: ExchangeClient>(
        &mut self,
        mirror: &mut ExchangeMirror<C>,
        market: &Market,
        now: i64,
        total_balance: Decimal,
        candles: &MarketCandles,
    ) {
        if self.paused() {
            return;
        }

        let state = match self.market_states.get_mut(market) {
            Some(s) => s,
            None => return,
        };

        if state.gbm.is_none() {
            match compute_gbm_parameters(&candles.hour) {
                Ok(params) => state.gbm = Some(params),
                Err(err) => {
                    warn!(%market, error = %err, "insufficient data for GBM parameters, skipping tick");
                    return;
                }
            }
        }
        if state.dynamics.is_none() {
            if let Ok(dynamics) = compute_market_dynamics_parameters(&candles.fifteen_min) {
                state.dynamics = Some(dynamics);
            }
        }

        let ticker = match mirror.ticker(market) {
            Some(t) => *t,
            None => return,
        };

        let active_count = Decimal::from(self.market_states.len().max(1) as u64);
        let ratio = if state.ratio.is_zero() {
            (Decimal::ONE - self.options.fiat_ratio) / active_count
        } else {
            state.ratio
        };
        let fiat_amount = ratio * total_balance * (Decimal::ONE - self.options.fiat_ratio);
        let target_balance = if ticker.average().is_zero() {
            Decimal::ZERO
        } else {
            fiat_amount / ticker.average()
        };

        let base = market.base().to_string();
        let quote = market.quote().to_string();
        let base_balance = mirror.balance(&base);
        let quote_balance = mirror.balance(&quote);

        match state.agent_state {
            AgentState::Idle | AgentState::TryingToEnter => {
                let has_sticky_buy = mirror
                    .open_orders_for(market)
                    .iter()
                    .any(|o| o.sticky && matches!(o.side, Side::Buy));
                let inputs = EntryInputs {
                    trend: state.trend.unwrap_or(Decimal::ZERO),
                    price_level: state.price_level.unwrap_or(Decimal::ONE),
                    ticker,
                    day_candles: &candles.day,
                    hour_candles: &candles.hour,
                    recent_buy_volume: mirror
                        .recent_trades(market)
                        .iter()
                        .filter(|t| matches!(t.side, Side::Buy))
                        .map(|t| t.amount)
                        .sum(),
                    recent_sell_volume: mirror
                        .recent_trades(market)
                        .iter()
                        .filter(|t| matches!(t.side, Side::Sell))
                        .map(|t| t.amount)
                        .sum(),
                };
                let ctx = EntryContext {
                    has_sticky_buy,
                    base_balance_total: base_balance.total(),
                    min_deal_amount: mirror
                        .config
                        .min_deal_amounts
                        .get(market)
                        .copied()
                        .unwrap_or(Decimal::ONE),
                    minimum_notional: Decimal::ZERO,
                    target_balance,
                    can_enter_more_markets: true,
                    quote_balance_free: quote_balance.free(),
                };

                match entry::evaluate_entry(&inputs, &self.options.entry, &ctx) {
                    EntryDecision::RemainTryingToEnter => state.agent_state = AgentState::TryingToEnter,
                    EntryDecision::CancelAndIdle => {
                        let _ = mirror.cancel_all_orders(now, Some(market), None).await;
                        state.agent_state = AgentState::Idle;
                    }
                    EntryDecision::AlreadyInMarket => state.agent_state = AgentState::HasPosition,
                    EntryDecision::AttemptEntry { amount, price } => {
                        let _ = mirror.cancel_all_orders(now, Some(market), None).await;
                        let req = CreateOrderRequest::new(market.clone(), OrderType::Limit, Side::Buy, amount)
                            .with_price(price)
                            .sticky();
                        if mirror.create_order(now, req).await.ok().flatten().is_some() {
                            state.agent_state = AgentState::TryingToEnter;
                            state.entry_price = Some(price);
                            state.entry_timestamp = Some(now);
                        }
                    }
                    EntryDecision::NoEntry => {}
                }
            }
            AgentState::HasPosition => {
                let min_deal_amount = mirror.config.min_deal_amounts.get(market).copied().unwrap_or(Decimal::ONE);
                let last_closed_sell = mirror.last_closed_order(market, Side::Sell).cloned();
                let last_closed_buy = mirror.last_closed_order(market, Side::Buy).cloned();

                let entry_price = state.entry_price.unwrap_or_else(|| last_closed_buy.as_ref().map(|o| o.price).unwrap_or(ticker.last));
                let entry_timestamp = state.entry_timestamp.unwrap_or_else(|| last_closed_buy.as_ref().map(|o| o.created_at).unwrap_or(now));

                let exit_ctx = ExitContext {
                    has_sticky_sell: false,
                    base_balance_total: base_balance.total(),
                    base_balance_free: base_balance.free(),
                    min_deal_amount,
                    minimum_notional: Decimal::ZERO,
                    can_trade: state.can_trade,
                };
                let exit_inputs = ExitInputs {
                    now,
                    ticker,
                    entry_price,
                    entry_timestamp,
                    day_candles: &candles.day,
                    hour_candles: &candles.hour,
                    highest_price_since_entry: ticker.last.max(entry_price),
                };

                match exit::evaluate_exit(&exit_inputs, &self.options.exit, &exit_ctx) {
                    ExitDecision::Exit { amount, trigger } => {
                        info!(%market, ?trigger, "exit triggered");
                        let _ = mirror.cancel_all_orders(now, Some(market), None).await;
                        let req = CreateOrderRequest::new(market.clone(), OrderType::Limit, Side::Sell, amount)
                            .with_price(ticker.ask)
                            .sticky();
                        if mirror.create_order(now, req).await.ok().flatten().is_some() {
                            state.agent_state = AgentState::TryingToLeave;
                        }
                    }
                    ExitDecision::NotInMarket => {
                        state.agent_state = AgentState::Idle;
                    }
                    ExitDecision::Hold | ExitDecision::CancelAndHold | ExitDecision::RemainTryingToLeave => {
                        let gbm = state.gbm.unwrap();
                        let has_open_buy = mirror.open_orders_for(market).iter().any(|o| matches!(o.side, Side::Buy));
                        let has_open_sell = mirror.open_orders_for(market).iter().any(|o| matches!(o.side, Side::Sell));
                        let hour_closes: Vec<Decimal> = candles.hour.iter().map(|c| c.close).collect();
                        let ema_slow = tail(&ema(&hour_closes, self.options.market_maker.ema_period_slow)).unwrap_or_else(|| ticker.average());
                        let mm_inputs = MarketMakerInputs {
                            ticker,
                            ema_slow,
                            base_balance_total: base_balance.total(),
                            base_balance_free: base_balance.free(),
                            quote_balance_free: quote_balance.free(),
                            target_balance,
                            now,
                            last_closed_sell,
                            last_closed_buy,
                            has_open_buy,
                            has_open_sell,
                            recent_trades: mirror.recent_trades(market).to_vec(),
                            last_quote_refresh: state.last_quote_refresh,
                        };
                        let mut mm_options = self.options.market_maker.clone();
                        if let Some(sigma) = Decimal::from_f64_retain(gbm.sigma) {
                            mm_options.sigma = sigma;
                        }
                        if let Some(mu) = Decimal::from_f64_retain(gbm.mu) {
                            mm_options.mu = mu;
                        }
                        if let Some(quote) = market_maker::quote_market(&mm_inputs, &mm_options, now) {
                            let _ = mirror.cancel_all_orders(now, Some(market), None).await;
                            if quote.can_buy {
                                let req = CreateOrderRequest::new(market.clone(), OrderType::Limit, Side::Buy, quote.buy_amount)
                                    .with_price(quote.bid);
                                let _ = mirror.create_order(now, req).await;
                            }
                            if quote.can_sell {
                                let req = CreateOrderRequest::new(market.clone(), OrderType::Limit, Side::Sell, quote.sell_amount)
                                    .with_price(quote.ask);
                                let _ = mirror.create_order(now, req).await;
                            }
                            state.last_quote_refresh = Some(now);
                        }
                    }
                }
            }
            AgentState::TryingToLeave => {
                let min_deal_amount = mirror.config.min_deal_amounts.get(market).copied().unwrap_or(Decimal::ONE);
                let entry_price = state.entry_price.unwrap_or(ticker.last);
                let entry_timestamp = state.entry_timestamp.unwrap_or(now);
                let exit_ctx = ExitContext {
                    has_sticky_sell: true,
                    base_balance_total: base_balance.total(),
                    base_balance_free: base_balance.free(),
                    min_deal_amount,
                    minimum_notional: Decimal::ZERO,
                    can_trade: state.can_trade,
                };
                let exit_inputs = ExitInputs {
                    now,
                    ticker,
                    entry_price,
                    entry_timestamp,
                    day_candles: &candles.day,
                    hour_candles: &candles.hour,
                    highest_price_since_entry: ticker.last.max(entry_price),
                };
                match exit::evaluate_exit(&exit_inputs, &self.options.exit, &exit_ctx) {
                    ExitDecision::CancelAndHold => {
                        let _ = mirror.cancel_all_orders(now, Some(market), None).await;
                        state.agent_state = AgentState::HasPosition;
                    }
                    ExitDecision::NotInMarket => {
                        state.agent_state = AgentState::Idle;
                        state.entry_price = None;
                        state.entry_timestamp = None;
                    }
                    _ => {}
                }
            }
        }
    }

    /// Drawdown guard: evaluated once per agent run, after every market has
    /// ticked. Returns `Some` the tick it trips.
    pub fn check_drawdown(&mut self, total_balance: Decimal) -> Option<mm_risk::DrawdownTriggered> {
        self.drawdown.record(total_balance)
    }
}
