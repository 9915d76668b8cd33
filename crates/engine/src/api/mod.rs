//! Market data sources

pub mod yahoo;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::PriceBar;

pub use yahoo::{Quote, YahooClient};

/// Anything that can supply price history and quote metadata for a ticker
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Ordered price bars for `symbol` over `range` (e.g. "6mo") at `interval` (e.g. "1d")
    async fn get_history(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<PriceBar>>;

    /// Display name and market capitalization for `symbol`
    async fn get_quote(&self, symbol: &str) -> Result<Quote>;
}
