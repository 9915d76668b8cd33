//! Indicators used by the signal engine
//!
//! EMAs come straight from `ta`: its `ExponentialMovingAverage` seeds with the
//! first input and blends later inputs with `α = 2 / (span + 1)`. The RSI is
//! built here on two of those smoothers, with zero gain/loss on the first bar
//! and an epsilon guard on the ratio.

use ta::indicators::ExponentialMovingAverage;
use ta::{Next, Period, Reset};

use crate::error::{SignalError, SignalResult};

/// Small constant keeping the RSI ratio finite when average loss is zero
pub const RSI_EPSILON: f64 = 1e-10;

/// Build a `ta` EMA, reporting a bad span under the config field `name`
pub fn ema(name: &'static str, period: usize) -> SignalResult<ExponentialMovingAverage> {
    ExponentialMovingAverage::new(period)
        .map_err(|_| SignalError::InvalidPeriod { name, value: period })
}

// ============================================================================
// Relative strength index
// ============================================================================

/// RSI over EMA-smoothed gains and losses
///
/// The first bar has no predecessor, so its delta is zero and both averages
/// are seeded with 0 (RSI of the first bar is therefore 0).
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    avg_gain: ExponentialMovingAverage,
    avg_loss: ExponentialMovingAverage,
    prev_close: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> SignalResult<Self> {
        Ok(Self {
            period,
            avg_gain: ema("rsi_period", period)?,
            avg_loss: ema("rsi_period", period)?,
            prev_close: None,
        })
    }
}

impl Next<f64> for Rsi {
    type Output = f64;

    fn next(&mut self, close: f64) -> f64 {
        let delta = self.prev_close.map_or(0.0, |prev| close - prev);
        self.prev_close = Some(close);

        let gain = self.avg_gain.next(delta.max(0.0));
        let loss = self.avg_loss.next((-delta).max(0.0));

        let rs = gain / (loss + RSI_EPSILON);
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Reset for Rsi {
    fn reset(&mut self) {
        self.avg_gain.reset();
        self.avg_loss.reset();
        self.prev_close = None;
    }
}

impl Period for Rsi {
    fn period(&self) -> usize {
        self.period
    }
}

/// Run a fresh indicator over a whole series
pub fn run_series<I>(mut indicator: I, values: &[f64]) -> Vec<f64>
where
    I: Next<f64, Output = f64>,
{
    values.iter().map(|&v| indicator.next(v)).collect()
}
