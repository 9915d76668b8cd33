//! Input-validation errors raised by the signal engine

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("bar {index} (timestamp {timestamp}) has no close price")]
    MissingClose { index: usize, timestamp: i64 },

    #[error("bar {index} (timestamp {timestamp}) has a non-finite close price: {close}")]
    NonFiniteClose {
        index: usize,
        timestamp: i64,
        close: f64,
    },

    #[error(
        "bar {index} timestamp {timestamp} does not follow previous timestamp {previous}"
    )]
    NonMonotonicTimestamp {
        index: usize,
        timestamp: i64,
        previous: i64,
    },

    #[error("invalid {name}: {value} (must be at least 1)")]
    InvalidPeriod { name: &'static str, value: usize },
}

impl SignalError {
    /// True when the caller's configuration is at fault rather than the price data
    pub fn is_config_error(&self) -> bool {
        matches!(self, SignalError::InvalidPeriod { .. })
    }
}

pub type SignalResult<T> = Result<T, SignalError>;
