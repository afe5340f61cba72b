//! Wires the job orchestrator to a single trading agent's tick: universe
//! selection, per-market reconciliation, then entry/market-maker/exit.
//! Grounded on `src/engine/trader.rs`'s run-loop shape (already adapted into
//! [`mm_strategy::TradingAgent`]) and generalized here into a
//! [`mm_scheduler::JobProcessor`] so the orchestrator can dispatch it by name.

use async_trait::async_trait;
use mm_allocator::{AllocatorOptions, MarketCandidate, PortfolioAllocator};
use mm_exchange::{Event, EventKind, ExchangeClient, ExchangeMirror};
use mm_instrument::Market;
use mm_scheduler::{Job, JobProcessor, ProcessError};
use mm_strategy::{MarketCandles, TradingAgent};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, warn};

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

pub struct AgentJobProcessor<C: ExchangeClient> {
    mirror: Mutex<ExchangeMirror<C>>,
    agent: Mutex<TradingAgent>,
    client: Arc<C>,
    allocator: PortfolioAllocator,
    markets: Vec<Market>,
}

impl<C: ExchangeClient> AgentJobProcessor<C> {
    pub fn new(mirror: ExchangeMirror<C>, agent: TradingAgent, client: Arc<C>, markets: Vec<Market>) -> Self {
        Self {
            mirror: Mutex::new(mirror),
            agent: Mutex::new(agent),
            client,
            allocator: PortfolioAllocator::new(AllocatorOptions::default()),
            markets,
        }
    }

    async fn select_universe(&self, now: i64) -> HashMap<Market, (bool, Vec<mm_instrument::Candle>)> {
        let mut candidates = HashMap::new();
        for market in &self.markets {
            let hourly = self.client.fetch_ohlcv(market, mm_exchange::Timeframe::OneHour, None, Some(24 * 7)).await;
            let daily = self.client.fetch_ohlcv(market, mm_exchange::Timeframe::OneDay, None, Some(30)).await;
            let tickers = self.client.fetch_tickers(Some(std::slice::from_ref(market))).await.ok();

            let (Some(hourly), Some(daily), Some(ticker)) =
                (hourly, daily, tickers.and_then(|t| t.get(market).copied()))
            else {
                continue;
            };

            candidates.insert(
                market.clone(),
                MarketCandidate {
                    ticker,
                    hourly_candles: hourly,
                    daily_candles: daily,
                },
            );
        }

        let settings = self.allocator.select_markets(&candidates);
        settings
            .into_iter()
            .filter_map(|s| {
                candidates
                    .remove(&s.market)
                    .map(|c| (s.market, (s.can_trade, c.daily_candles)))
            })
            .collect()
    }

    async fn candles_for(&self, market: &Market) -> Option<MarketCandles> {
        let day = self.client.fetch_ohlcv(market, mm_exchange::Timeframe::OneDay, None, Some(30)).await?;
        let hour = self.client.fetch_ohlcv(market, mm_exchange::Timeframe::OneHour, None, Some(24 * 7)).await?;
        let fifteen_min = self.client.fetch_ohlcv(market, mm_exchange::Timeframe::FifteenMin, None, Some(1001)).await?;
        Some(MarketCandles { day, hour, fifteen_min })
    }
}

#[async_trait]
impl<C: ExchangeClient> JobProcessor for AgentJobProcessor<C> {
    async fn process(&self, _job: &Job) -> Result<(), ProcessError> {
        let now = now_ms();
        let mut mirror = self.mirror.lock().await;
        let mut agent = self.agent.lock().await;

        if agent.paused() {
            warn!("drawdown guard is paused, skipping this run");
            return Ok(());
        }

        mirror.sync_balance().await;
        mirror.sync_tickers(None).await;

        let universe = self.select_universe(now).await;
        agent.before_run(&universe);

        // Per-market work is run sequentially against the shared mirror,
        // same precedent as ExchangeMirror::cancel_all_orders: the mirror
        // is single-owned within a run, so genuine concurrency would need
        // per-market mirror partitioning that is out of scope here.
        let active_markets: Vec<Market> = agent.active_markets().cloned().collect();
        for market in &active_markets {
            if let Err(err) = mirror.update(now, Some(market)).await {
                warn!(%market, error = %err, "reconciliation failed, skipping tick for market");
                continue;
            }

            let Some(candles) = self.candles_for(market).await else {
                warn!(%market, "no candle data available, skipping tick");
                continue;
            };

            let total_balance = mirror.get_total_balance(true, None).unwrap_or(Decimal::ZERO);
            agent.run_for_market(&mut mirror, market, now, total_balance, &candles).await;
        }

        let total_balance = mirror.get_total_balance(true, None).unwrap_or(Decimal::ZERO);
        if let Some(triggered) = agent.check_drawdown(total_balance) {
            mirror.set_lockdown(true);
            mirror.record_event(
                now,
                EventKind::MaxDrawdownReached {
                    peak: triggered.peak,
                    current_total: triggered.current_total,
                },
            );
        }

        let events: Vec<Event> = mirror.drain_events();
        for event in events {
            info!(?event, "exchange event");
        }

        Ok(())
    }
}
