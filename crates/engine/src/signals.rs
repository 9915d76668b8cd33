//! EMA crossover + RSI filter signal engine
//!
//! A bar is a BUY when the fast EMA crosses above the slow EMA while RSI is
//! below the sell threshold (not overbought), and a SELL when the fast EMA
//! crosses below the slow EMA while RSI is above the buy threshold (not
//! oversold). Everything else is HOLD.

use ta::Next;
use tracing::debug;

use crate::error::{SignalError, SignalResult};
use crate::indicators::{ema, Rsi};
use crate::types::{IndicatorRow, IndicatorSeries, PriceBar, Signal, SignalConfig};

/// Direction of an EMA crossover at a bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    Bullish,
    Bearish,
}

/// Classify the move of `diff = ema_short - ema_long` from the previous bar
///
/// `prev_diff` is `None` for the first bar, which never crosses.
pub fn detect_crossover(prev_diff: Option<f64>, diff: f64) -> Option<Crossover> {
    let prev = prev_diff?;
    if diff > 0.0 && prev <= 0.0 {
        Some(Crossover::Bullish)
    } else if diff < 0.0 && prev >= 0.0 {
        Some(Crossover::Bearish)
    } else {
        None
    }
}

/// Signal for a single bar given its crossover state and RSI
pub fn decide_signal(
    prev_diff: Option<f64>,
    diff: f64,
    rsi: f64,
    config: &SignalConfig,
) -> Signal {
    match detect_crossover(prev_diff, diff) {
        Some(Crossover::Bullish) if rsi < config.rsi_sell_threshold => Signal::Buy,
        Some(Crossover::Bearish) if rsi > config.rsi_buy_threshold => Signal::Sell,
        _ => Signal::Hold,
    }
}

/// Check ordering and close prices, returning the close column
fn validate_bars(bars: &[PriceBar]) -> SignalResult<Vec<f64>> {
    let mut closes = Vec::with_capacity(bars.len());
    let mut previous: Option<i64> = None;

    for (index, bar) in bars.iter().enumerate() {
        if let Some(prev) = previous {
            if bar.timestamp <= prev {
                return Err(SignalError::NonMonotonicTimestamp {
                    index,
                    timestamp: bar.timestamp,
                    previous: prev,
                });
            }
        }
        previous = Some(bar.timestamp);

        let close = bar.close.ok_or(SignalError::MissingClose {
            index,
            timestamp: bar.timestamp,
        })?;
        if !close.is_finite() {
            return Err(SignalError::NonFiniteClose {
                index,
                timestamp: bar.timestamp,
                close,
            });
        }
        closes.push(close);
    }

    Ok(closes)
}

/// Compute EMAs, RSI and the per-bar signal for an ordered price series
///
/// The output has exactly one row per input bar, in input order. An empty
/// input yields an empty series.
pub fn analyze_signals(
    bars: &[PriceBar],
    config: &SignalConfig,
) -> SignalResult<IndicatorSeries> {
    config.validate()?;
    let closes = validate_bars(bars)?;

    let mut ema_short = ema("ema_short_period", config.ema_short_period)?;
    let mut ema_long = ema("ema_long_period", config.ema_long_period)?;
    let mut rsi = Rsi::new(config.rsi_period)?;

    let mut rows = Vec::with_capacity(bars.len());
    let mut prev_diff: Option<f64> = None;

    for (bar, &close) in bars.iter().zip(&closes) {
        let short = ema_short.next(close);
        let long = ema_long.next(close);
        let rsi_value = rsi.next(close);

        let diff = short - long;
        let signal = decide_signal(prev_diff, diff, rsi_value, config);
        prev_diff = Some(diff);

        rows.push(IndicatorRow {
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close,
            ema_short: short,
            ema_long: long,
            rsi: rsi_value,
            signal,
        });
    }

    let series = IndicatorSeries::new(*config, rows);
    debug!(
        bars = series.len(),
        signals = series.signal_table().len(),
        ema_short = config.ema_short_period,
        ema_long = config.ema_long_period,
        "Analyzed price series"
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PriceBar {
                timestamp: 1_700_000_000 + (i as i64) * 86_400,
                open: Some(p),
                high: Some(p + 1.0),
                low: Some(p - 1.0),
                close: Some(p),
            })
            .collect()
    }

    fn signals(series: &IndicatorSeries) -> Vec<Signal> {
        series.rows().iter().map(|r| r.signal).collect()
    }

    fn short_config() -> SignalConfig {
        SignalConfig {
            ema_short_period: 2,
            ema_long_period: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_input() {
        let series = analyze_signals(&[], &SignalConfig::default()).unwrap();
        assert!(series.is_empty());
        assert!(series.signal_table().is_empty());
    }

    #[test]
    fn test_single_bar_holds() {
        let series = analyze_signals(&make_bars(&[42.0]), &SignalConfig::default()).unwrap();
        assert_eq!(series.len(), 1);
        let row = series.rows()[0];
        assert_eq!(row.ema_short, 42.0);
        assert_eq!(row.ema_long, 42.0);
        assert_eq!(row.signal, Signal::Hold);
    }

    #[test]
    fn test_preserves_length_order_and_passthrough() {
        let bars = make_bars(&[5.0, 6.0, 4.0, 7.0, 3.0, 8.0, 9.0]);
        let series = analyze_signals(&bars, &short_config()).unwrap();
        assert_eq!(series.len(), bars.len());
        for (bar, row) in bars.iter().zip(series.rows()) {
            assert_eq!(bar.timestamp, row.timestamp);
            assert_eq!(bar.open, row.open);
            assert_eq!(bar.high, row.high);
            assert_eq!(bar.low, row.low);
            assert_eq!(bar.close, Some(row.close));
        }
        assert_eq!(series.rows()[0].signal, Signal::Hold);
    }

    #[test]
    fn test_result_carries_config() {
        let config = short_config();
        let series = analyze_signals(&make_bars(&[1.0, 2.0]), &config).unwrap();
        assert_eq!(series.config(), &config);
    }

    #[test]
    fn test_deterministic() {
        let prices: Vec<f64> = (0..120)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0)
            .collect();
        let bars = make_bars(&prices);
        let a = analyze_signals(&bars, &SignalConfig::default()).unwrap();
        let b = analyze_signals(&bars, &SignalConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rsi_stays_in_bounds() {
        let prices: Vec<f64> = (0..200)
            .map(|i| 50.0 + (i as f64 * 0.17).sin() * 20.0 + (i % 7) as f64)
            .collect();
        let series = analyze_signals(&make_bars(&prices), &SignalConfig::default()).unwrap();
        assert!(series
            .rows()
            .iter()
            .all(|r| (0.0..=100.0).contains(&r.rsi)));
    }

    #[test]
    fn test_constant_series() {
        let series = analyze_signals(&make_bars(&[73.25; 60]), &SignalConfig::default()).unwrap();
        for row in series.rows() {
            assert_eq!(row.ema_short, 73.25);
            assert_eq!(row.ema_long, 73.25);
            assert_eq!(row.rsi, 0.0);
            assert_eq!(row.signal, Signal::Hold);
        }
    }

    #[test]
    fn test_spans_longer_than_series_hold() {
        let series =
            analyze_signals(&make_bars(&[10.0, 10.0, 10.0, 20.0, 10.0]), &SignalConfig::default())
                .unwrap();
        assert_eq!(signals(&series), vec![Signal::Hold; 5]);
    }

    #[test]
    fn test_crossover_on_price_path() {
        // bearish cross at 1 is rejected (RSI 0), bullish at 4 passes (RSI ~68.8),
        // bearish at 6 passes (RSI ~44.8)
        let bars = make_bars(&[10.0, 9.0, 8.0, 7.0, 12.0, 13.0, 9.0, 6.0, 5.0]);
        let series = analyze_signals(&bars, &short_config()).unwrap();

        let rows = series.rows();
        assert!(rows[1].ema_short < rows[1].ema_long);
        assert!((rows[4].rsi - 68.78770584648137).abs() < 1e-9);

        use Signal::*;
        assert_eq!(
            signals(&series),
            vec![Hold, Hold, Hold, Hold, Buy, Hold, Sell, Hold, Hold]
        );

        let table = series.signal_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].timestamp, bars[4].timestamp);
        assert_eq!(table[1].signal, Sell);
        assert_eq!(series.latest_signal().map(|r| r.signal), Some(Sell));
    }

    #[test]
    fn test_tighter_sell_threshold_rejects_buy() {
        let bars = make_bars(&[10.0, 9.0, 8.0, 7.0, 12.0]);
        let config = SignalConfig {
            rsi_sell_threshold: 60.0,
            ..short_config()
        };
        let series = analyze_signals(&bars, &config).unwrap();
        assert_eq!(signals(&series), vec![Signal::Hold; 5]);
        assert!(series.latest_signal().is_none());
    }

    #[test]
    fn test_buy_on_constructed_crossover_with_low_rsi() {
        let config = SignalConfig::default();
        // ema_short - ema_long goes from -0.4 at bar 4 to +0.2 at bar 5
        let diffs = [-1.0, -0.9, -0.7, -0.6, -0.4, 0.2];
        let rsi = [50.0, 45.0, 40.0, 35.0, 30.0, 25.0];
        let out: Vec<Signal> = (0..diffs.len())
            .map(|i| {
                let prev = if i == 0 { None } else { Some(diffs[i - 1]) };
                decide_signal(prev, diffs[i], rsi[i], &config)
            })
            .collect();
        assert_eq!(out[5], Signal::Buy);
        assert!(out[..5].iter().all(|s| s.is_hold()));
    }

    #[test]
    fn test_overbought_crossover_is_held() {
        let config = SignalConfig::default();
        assert_eq!(decide_signal(Some(-0.4), 0.2, 85.0, &config), Signal::Hold);
        // exactly at the threshold is also rejected
        assert_eq!(decide_signal(Some(-0.4), 0.2, 70.0, &config), Signal::Hold);
    }

    #[test]
    fn test_sell_requires_rsi_above_buy_threshold() {
        let config = SignalConfig::default();
        assert_eq!(decide_signal(Some(0.3), -0.1, 55.0, &config), Signal::Sell);
        assert_eq!(decide_signal(Some(0.3), -0.1, 30.0, &config), Signal::Hold);
        assert_eq!(decide_signal(Some(0.0), -0.1, 55.0, &config), Signal::Sell);
    }

    #[test]
    fn test_crossover_edges() {
        assert_eq!(detect_crossover(None, 5.0), None);
        assert_eq!(detect_crossover(Some(0.0), 0.1), Some(Crossover::Bullish));
        assert_eq!(detect_crossover(Some(0.0), -0.1), Some(Crossover::Bearish));
        assert_eq!(detect_crossover(Some(0.0), 0.0), None);
        assert_eq!(detect_crossover(Some(0.5), 0.0), None);
        assert_eq!(detect_crossover(Some(1.0), 2.0), None);
    }

    #[test]
    fn test_crossovers_are_mutually_exclusive() {
        let samples = [-2.0, -1e-12, 0.0, 1e-12, 2.0];
        for &prev in &samples {
            for &diff in &samples {
                let bullish = diff > 0.0 && prev <= 0.0;
                let bearish = diff < 0.0 && prev >= 0.0;
                assert!(!(bullish && bearish));
                let expected = if bullish {
                    Some(Crossover::Bullish)
                } else if bearish {
                    Some(Crossover::Bearish)
                } else {
                    None
                };
                assert_eq!(detect_crossover(Some(prev), diff), expected);
            }
        }
    }

    #[test]
    fn test_missing_close_fails() {
        let mut bars = make_bars(&[1.0, 2.0, 3.0]);
        bars[1].close = None;
        let err = analyze_signals(&bars, &SignalConfig::default()).unwrap_err();
        assert_eq!(
            err,
            SignalError::MissingClose {
                index: 1,
                timestamp: bars[1].timestamp
            }
        );
    }

    #[test]
    fn test_nan_close_fails() {
        let mut bars = make_bars(&[1.0, 2.0, 3.0]);
        bars[2].close = Some(f64::NAN);
        let err = analyze_signals(&bars, &SignalConfig::default()).unwrap_err();
        assert!(matches!(err, SignalError::NonFiniteClose { index: 2, .. }));
    }

    #[test]
    fn test_duplicate_timestamp_fails() {
        let mut bars = make_bars(&[1.0, 2.0, 3.0]);
        bars[2].timestamp = bars[1].timestamp;
        let err = analyze_signals(&bars, &SignalConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            SignalError::NonMonotonicTimestamp { index: 2, .. }
        ));
    }

    #[test]
    fn test_decreasing_timestamp_fails() {
        let mut bars = make_bars(&[1.0, 2.0]);
        bars.swap(0, 1);
        assert!(analyze_signals(&bars, &SignalConfig::default()).is_err());
    }

    #[test]
    fn test_zero_period_fails() {
        let config = SignalConfig {
            rsi_period: 0,
            ..Default::default()
        };
        let err = analyze_signals(&make_bars(&[1.0]), &config).unwrap_err();
        assert_eq!(
            err,
            SignalError::InvalidPeriod {
                name: "rsi_period",
                value: 0
            }
        );
    }

    #[test]
    fn test_row_json_shape() {
        let series = analyze_signals(&make_bars(&[10.0, 11.0]), &SignalConfig::default()).unwrap();
        let json = serde_json::to_value(series.rows()).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);

        let row = rows[0].as_object().unwrap();
        let mut keys: Vec<&str> = row.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["close", "ema_long", "ema_short", "high", "low", "open", "rsi", "signal", "timestamp"]
        );
        assert_eq!(row["signal"], "HOLD");
        assert_eq!(row["timestamp"], 1_700_000_000);
        assert_eq!(row["close"], 10.0);
        assert_eq!(row["high"], 11.0);
    }

    #[test]
    fn test_signal_encoding_and_serde() {
        assert_eq!(Signal::Buy.as_i8(), 1);
        assert_eq!(Signal::Sell.as_i8(), -1);
        assert_eq!(Signal::Hold.as_i8(), 0);
        assert_eq!(serde_json::to_string(&Signal::Buy).unwrap(), "\"BUY\"");
        assert_eq!(Signal::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: SignalConfig = serde_json::from_str(r#"{"rsi_period": 9}"#).unwrap();
        assert_eq!(config.rsi_period, 9);
        assert_eq!(config.ema_short_period, 12);
        assert_eq!(config.ema_long_period, 26);
        assert_eq!(config.rsi_buy_threshold, 30.0);
        assert_eq!(config.rsi_sell_threshold, 70.0);
    }
}
