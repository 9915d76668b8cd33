//! Stock Signals Engine - EMA crossover + RSI filter signals for equities
//!
//! Provides:
//! - The signal engine: EMAs, RSI and a BUY/SELL/HOLD signal per price bar
//! - RSI built on the `ta` crate's EMA
//! - Yahoo Finance public API client for price history and quotes
//! - Market-cap snapshot of a fixed ticker universe

pub mod api;
pub mod error;
pub mod indicators;
pub mod signals;
pub mod snapshot;
pub mod types;

// Re-exports for convenience
pub use api::{MarketDataSource, Quote, YahooClient};
pub use error::{SignalError, SignalResult};
pub use indicators::{ema, Rsi};
pub use signals::{analyze_signals, decide_signal, detect_crossover, Crossover};
pub use snapshot::{
    load_tickers, parse_tickers, rank_by_market_cap, take_snapshot, MarketSnapshot,
    TickerSnapshot, DEFAULT_CONCURRENCY, SNAPSHOT_LIMIT,
};
pub use types::*;
