//! Yahoo Finance public API client for equity market data (no authentication required)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::MarketDataSource;
use crate::types::PriceBar;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Yahoo Finance market data client
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: Url,
}

/// Quote metadata for one ticker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub market_cap: Option<u64>,
}

impl Quote {
    /// Short name, falling back to the long name, else empty
    pub fn display_name(&self) -> String {
        self.short_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.long_name.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

/// Wrapper: the chart endpoint returns `{ "chart": { "result": [...], "error": ... } }`
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

/// Price columns; Yahoo uses `null` for bars it has no data for
#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    quote_response: QuoteEnvelope,
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(default)]
    result: Vec<Quote>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    description: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code.as_deref().unwrap_or("error"),
            self.description.as_deref().unwrap_or("unknown")
        )
    }
}

/// Zip the columnar chart payload into bars, dropping rows with no prices at all
fn bars_from_chart(result: ChartResult) -> Vec<PriceBar> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let column = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();

    result
        .timestamp
        .iter()
        .enumerate()
        .map(|(i, &timestamp)| PriceBar {
            timestamp,
            open: column(&quote.open, i),
            high: column(&quote.high, i),
            low: column(&quote.low, i),
            close: column(&quote.close, i),
        })
        .filter(|bar| {
            bar.open.is_some() || bar.high.is_some() || bar.low.is_some() || bar.close.is_some()
        })
        .collect()
}

impl YahooClient {
    /// Create a new client against the public Yahoo Finance host
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against another host (proxies, test servers)
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid Yahoo base URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Yahoo base URL cannot carry a path: {}", base_url);
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Base URL extended with `segments`, each percent-encoded as a single path segment
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn chart_url(&self, symbol: &str, range: &str, interval: &str) -> Url {
        let mut url = self.endpoint(&["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("range", range)
            .append_pair("interval", interval);
        url
    }

    fn quote_url(&self, symbol: &str) -> Url {
        let mut url = self.endpoint(&["v7", "finance", "quote"]);
        url.query_pairs_mut().append_pair("symbols", symbol);
        url
    }

    /// Fetch daily (or intraday) bars for a symbol
    pub async fn get_chart(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<PriceBar>> {
        let url = self.chart_url(symbol, range, interval);

        debug!(symbol, range, interval, "Fetching chart from Yahoo");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Yahoo API error {}: {}", status, body);
        }

        let chart: ChartResponse = response.json().await?;
        if let Some(err) = chart.chart.error {
            anyhow::bail!("Yahoo chart error for {}: {}", symbol, err);
        }

        let bars = chart
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .map(bars_from_chart)
            .unwrap_or_default();

        debug!(symbol, count = bars.len(), "Fetched bars");
        Ok(bars)
    }

    /// Fetch name and market cap for a symbol
    pub async fn get_quote_summary(&self, symbol: &str) -> Result<Quote> {
        let response = self.client.get(self.quote_url(symbol)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Yahoo API error {}: {}", status, body);
        }

        let quotes: QuoteResponse = response.json().await?;
        if let Some(err) = quotes.quote_response.error {
            anyhow::bail!("Yahoo quote error for {}: {}", symbol, err);
        }

        quotes
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No quote returned for {}", symbol))
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn get_history(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<PriceBar>> {
        self.get_chart(symbol, range, interval).await
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        self.get_quote_summary(symbol).await
    }
}
