//! Composition root: wires the exchange mirror, trading agent and job
//! orchestrator together and runs the poll loop until signalled to stop.
//! Grounded on the legacy `src/lib.rs` crate-composition shape and on
//! `barter-data`'s `tracing_subscriber::fmt()` init pattern.

mod agent_job;
mod config;
mod sim_exchange;

use agent_job::AgentJobProcessor;
use config::Settings;
use mm_exchange::{ExchangeConfig, ExchangeMirror};
use mm_instrument::Market;
use mm_scheduler::{InMemoryJobStore, JobOrchestrator};
use mm_strategy::{AgentOptions, EntryOptions, ExitOptions, MarketMakerOptions, TradingAgent};
use rust_decimal::Decimal;
use sim_exchange::SimExchange;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(cfg!(debug_assertions))
        .init();
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

#[tokio::main]
async fn main() {
    init_logging();
    let settings = Settings::from_env();
    info!(fiat = %settings.fiat_currency, poll_interval = ?settings.poll_interval, "marketmaker starting");

    let markets = vec![Market::new("BTC", settings.fiat_currency.clone()), Market::new("ETH", settings.fiat_currency.clone())];

    let client = Arc::new(SimExchange::new(markets.clone(), settings.starting_price, Decimal::ONE, now_ms()));

    let exchange_config = ExchangeConfig {
        simulation: true,
        fee: Decimal::new(1, 3),
        fiat_currency: settings.fiat_currency.clone(),
        force_auto_cancel: false,
        max_sync_age: 60_000,
        reserves: Default::default(),
        min_deal_amounts: Default::default(),
        rate_limit_interval_ms: settings.rate_limit_interval_ms,
    };
    let mut mirror = ExchangeMirror::new(exchange_config, client.clone());

    let agent_options = AgentOptions {
        minimum_trend: Decimal::new(1, 1),
        maximum_price_level: Decimal::new(6, 1),
        fiat_ratio: settings.fiat_ratio,
        max_drawdown: settings.max_drawdown,
        entry: EntryOptions::default(),
        exit: ExitOptions::default(),
        market_maker: MarketMakerOptions::default(),
    };
    let agent = TradingAgent::new(agent_options);

    mirror.sync_balance().await;
    mirror.sync_tickers(None).await;

    let processor = Arc::new(AgentJobProcessor::new(mirror, agent, client, markets));

    let store = Arc::new(InMemoryJobStore::new());
    let mut orchestrator = JobOrchestrator::new(store, settings.poll_interval);
    orchestrator.register("run_agent", processor);
    orchestrator
        .create_repeating_job("run_agent", serde_json::json!(null), settings.poll_interval, now_ms())
        .await
        .expect("failed to seed the repeating agent job");

    orchestrator.run().await;
    info!("marketmaker stopped");
}
