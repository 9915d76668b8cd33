//! Types shared by the signal engine and its data sources

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// A single OHLC price bar
///
/// Only `close` is required by the engine; the other prices are carried
/// through to the output untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Unix timestamp (seconds) of the bar open
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl PriceBar {
    /// Bar where every price equals `close`
    pub fn flat(timestamp: i64, close: f64) -> Self {
        Self {
            timestamp,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close: Some(close),
        }
    }
}

/// Discrete trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Numeric encoding: 1 = buy, -1 = sell, 0 = hold
    pub fn as_i8(self) -> i8 {
        match self {
            Signal::Buy => 1,
            Signal::Sell => -1,
            Signal::Hold => 0,
        }
    }

    pub fn is_hold(self) -> bool {
        self == Signal::Hold
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        };
        f.pad(s)
    }
}

/// Parameters of the EMA crossover + RSI filter strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Fast EMA span (default: 12)
    pub ema_short_period: usize,
    /// Slow EMA span (default: 26)
    pub ema_long_period: usize,
    /// Span of the gain/loss averages feeding RSI (default: 14)
    pub rsi_period: usize,
    /// Sell signals require RSI above this (default: 30)
    pub rsi_buy_threshold: f64,
    /// Buy signals require RSI below this (default: 70)
    pub rsi_sell_threshold: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            ema_short_period: 12,
            ema_long_period: 26,
            rsi_period: 14,
            rsi_buy_threshold: 30.0,
            rsi_sell_threshold: 70.0,
        }
    }
}

impl SignalConfig {
    /// Reject zero-length smoothing spans
    pub fn validate(&self) -> Result<(), SignalError> {
        let periods = [
            ("ema_short_period", self.ema_short_period),
            ("ema_long_period", self.ema_long_period),
            ("rsi_period", self.rsi_period),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(SignalError::InvalidPeriod { name, value });
            }
        }
        Ok(())
    }
}

/// One output row: the input bar plus its indicator values and signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub ema_short: f64,
    pub ema_long: f64,
    pub rsi: f64,
    pub signal: Signal,
}

/// Result of one engine run, carrying the configuration it was computed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    config: SignalConfig,
    rows: Vec<IndicatorRow>,
}

impl IndicatorSeries {
    pub(crate) fn new(config: SignalConfig, rows: Vec<IndicatorRow>) -> Self {
        Self { config, rows }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows carrying a BUY or SELL signal, in chronological order
    pub fn signal_table(&self) -> Vec<IndicatorRow> {
        self.rows
            .iter()
            .filter(|row| !row.signal.is_hold())
            .copied()
            .collect()
    }

    /// Most recent non-HOLD row
    pub fn latest_signal(&self) -> Option<&IndicatorRow> {
        self.rows.iter().rev().find(|row| !row.signal.is_hold())
    }
}
