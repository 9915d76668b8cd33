//! Market-cap snapshot of a fixed ticker universe
//!
//! Loads the universe from a plain-text list, fetches the last two daily
//! closes and the quote metadata for each ticker, and ranks the result by
//! market capitalization.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::MarketDataSource;

/// Maximum number of entries returned by a snapshot
pub const SNAPSHOT_LIMIT: usize = 100;

/// Default number of tickers fetched concurrently
pub const DEFAULT_CONCURRENCY: usize = 8;

/// One ticker's price move and size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub symbol: String,
    pub name: String,
    pub price: Option<f64>,
    pub prev_close: Option<f64>,
    pub pct_change: Option<f64>,
    pub market_cap: Option<u64>,
}

impl TickerSnapshot {
    /// Build from the most recent closes (oldest first)
    ///
    /// With a single close, the previous close equals the last one. Returns
    /// `None` when there are no closes at all.
    pub fn from_closes(
        symbol: impl Into<String>,
        name: impl Into<String>,
        closes: &[f64],
        market_cap: Option<u64>,
    ) -> Option<Self> {
        let last = *closes.last()?;
        let prev = if closes.len() >= 2 {
            closes[closes.len() - 2]
        } else {
            last
        };

        let pct_change = if prev != 0.0 {
            Some((last - prev) / prev * 100.0)
        } else {
            None
        };

        Some(Self {
            symbol: symbol.into(),
            name: name.into(),
            price: Some(last),
            prev_close: Some(prev),
            pct_change,
            market_cap,
        })
    }
}

/// Ranked snapshot of the ticker universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Unix timestamp (seconds) when the snapshot was taken
    pub generated_at: i64,
    pub elapsed_seconds: f64,
    pub data: Vec<TickerSnapshot>,
}

/// Parse a ticker list: one symbol per line, `#` comments and blank lines skipped
pub fn parse_tickers(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load the ticker universe; a missing file is an empty universe
pub fn load_tickers(path: impl AsRef<Path>) -> anyhow::Result<Vec<String>> {
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "Ticker list not found");
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_tickers(&contents))
}

/// Sort by market cap descending (missing caps count as zero) and keep the top `limit`
pub fn rank_by_market_cap(mut entries: Vec<TickerSnapshot>, limit: usize) -> Vec<TickerSnapshot> {
    entries.sort_by(|a, b| b.market_cap.unwrap_or(0).cmp(&a.market_cap.unwrap_or(0)));
    entries.truncate(limit);
    entries
}

async fn snapshot_ticker<S>(source: &S, symbol: &str) -> anyhow::Result<Option<TickerSnapshot>>
where
    S: MarketDataSource + ?Sized,
{
    let history = source.get_history(symbol, "2d", "1d").await?;
    let closes: Vec<f64> = history.iter().filter_map(|bar| bar.close).collect();
    if closes.is_empty() {
        debug!(symbol, "No recent closes, skipping");
        return Ok(None);
    }

    let quote = source.get_quote(symbol).await?;

    Ok(TickerSnapshot::from_closes(
        symbol,
        quote.display_name(),
        &closes,
        quote.market_cap,
    ))
}

/// Fetch every ticker (at most `concurrency` at a time) and rank by market cap
///
/// Tickers whose history or quote fails to fetch, or that have no recent
/// closes, are left out. Results keep ticker-list order until ranked, so
/// equal market caps stay in list order.
pub async fn take_snapshot<S>(source: &S, tickers: &[String], concurrency: usize) -> MarketSnapshot
where
    S: MarketDataSource + ?Sized,
{
    let start = Instant::now();
    info!(tickers = tickers.len(), concurrency, "Taking market snapshot");

    let entries: Vec<TickerSnapshot> = stream::iter(tickers.iter().cloned())
        .map(|symbol| async move {
            match snapshot_ticker(source, &symbol).await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Skipping ticker");
                    None
                }
            }
        })
        .buffered(concurrency.max(1))
        .filter_map(|entry| async move { entry })
        .collect()
        .await;

    let fetched = entries.len();
    let data = rank_by_market_cap(entries, SNAPSHOT_LIMIT);
    let elapsed_seconds = start.elapsed().as_secs_f64();

    info!(
        fetched,
        skipped = tickers.len() - fetched,
        elapsed_seconds,
        "Market snapshot complete"
    );

    MarketSnapshot {
        generated_at: Utc::now().timestamp(),
        elapsed_seconds,
        data,
    }
}
