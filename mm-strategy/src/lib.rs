//! Per-(agent, market) strategy state machine: entry gating, two-sided
//! market making, and exit, dispatched by the trading agent.

mod agent;
mod entry;
mod exit;
mod market_maker;

pub use agent::{AgentOptions, AgentState, MarketCandles, MarketState, TradingAgent};
pub use entry::{entry_possible, evaluate_entry, EntryContext, EntryDecision, EntryInputs, EntryOptions};
pub use exit::{compute_stop_price, evaluate_exit, exit_trigger, ExitContext, ExitDecision, ExitInputs, ExitOptions, ExitTrigger, TrailingStopConfig};
pub use market_maker::{quote_market, DesiredQuote, MarketMakerInputs, MarketMakerOptions};
