//! Indicator bundle computation over a candle window.

use crate::domain::market::types::{BollingerValue, Candle, IndicatorBundle, MacdValue};
use rust_decimal::prelude::ToPrimitive;
use ta::Next;
use ta::indicators::{
    BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
    SimpleMovingAverage,
};

/// Fewer candles than this and the bundle is not computed; the snapshot
/// ships with `indicators = None` and is withheld from the Trader.
pub const MIN_CANDLES: usize = 30;

#[derive(Debug, Clone, Copy)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub sma_fast_period: usize,
    pub sma_slow_period: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            sma_fast_period: 20,
            sma_slow_period: 50,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
        }
    }
}

/// Streams the window's closes through each indicator and returns the
/// final values. Returns None when the window is too short.
pub fn compute_bundle(candles: &[Candle], config: &IndicatorConfig) -> Option<IndicatorBundle> {
    if candles.len() < MIN_CANDLES {
        return None;
    }

    let mut rsi = RelativeStrengthIndex::new(config.rsi_period).ok()?;
    let mut macd = MovingAverageConvergenceDivergence::new(
        config.macd_fast,
        config.macd_slow,
        config.macd_signal,
    )
    .ok()?;
    let mut sma_fast = SimpleMovingAverage::new(config.sma_fast_period).ok()?;
    let mut sma_slow = SimpleMovingAverage::new(config.sma_slow_period).ok()?;
    let mut bollinger =
        BollingerBands::new(config.bollinger_period, config.bollinger_std_dev).ok()?;

    let mut rsi_value = 50.0;
    let mut macd_value = MacdValue {
        line: 0.0,
        signal: 0.0,
        histogram: 0.0,
    };
    let mut sma_fast_value = 0.0;
    let mut sma_slow_value = 0.0;
    let mut bollinger_value = BollingerValue {
        upper: 0.0,
        middle: 0.0,
        lower: 0.0,
    };

    for candle in candles {
        let close = candle.close.to_f64()?;
        rsi_value = rsi.next(close);
        let macd_output = macd.next(close);
        macd_value = MacdValue {
            line: macd_output.macd,
            signal: macd_output.signal,
            histogram: macd_output.histogram,
        };
        sma_fast_value = sma_fast.next(close);
        sma_slow_value = sma_slow.next(close);
        let bands = bollinger.next(close);
        bollinger_value = BollingerValue {
            upper: bands.upper,
            middle: bands.average,
            lower: bands.lower,
        };
    }

    Some(IndicatorBundle {
        rsi14: rsi_value,
        macd: macd_value,
        sma_fast: sma_fast_value,
        sma_slow: sma_slow_value,
        bollinger: bollinger_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal::Decimal;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                symbol: "BTC/USDT".to_string(),
                timeframe: Timeframe::FifteenMin,
                open_time: i as i64 * 900_000,
                open: Decimal::from_f64_retain(close).unwrap(),
                high: Decimal::from_f64_retain(close + 1.0).unwrap(),
                low: Decimal::from_f64_retain(close - 1.0).unwrap(),
                close: Decimal::from_f64_retain(close).unwrap(),
                volume: Decimal::from(100),
            })
            .collect()
    }

    #[test]
    fn test_too_few_candles_yields_none() {
        let short: Vec<f64> = (0..MIN_CANDLES - 1).map(|i| 100.0 + i as f64).collect();
        assert!(compute_bundle(&candles(&short), &IndicatorConfig::default()).is_none());
    }

    #[test]
    fn test_uptrend_indicator_direction() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let bundle = compute_bundle(&candles(&closes), &IndicatorConfig::default()).unwrap();

        // A steady uptrend ends overbought with the fast average above
        // the slow one and positive MACD.
        assert!(bundle.rsi14 > 70.0);
        assert!(bundle.sma_fast > bundle.sma_slow);
        assert!(bundle.macd.line > 0.0);
        assert!(bundle.bollinger.upper > bundle.bollinger.middle);
        assert!(bundle.bollinger.middle > bundle.bollinger.lower);
    }

    #[test]
    fn test_downtrend_indicator_direction() {
        let closes: Vec<f64> = (0..100).map(|i| 500.0 - 2.0 * i as f64).collect();
        let bundle = compute_bundle(&candles(&closes), &IndicatorConfig::default()).unwrap();
        assert!(bundle.rsi14 < 30.0);
        assert!(bundle.sma_fast < bundle.sma_slow);
        assert!(bundle.macd.line < 0.0);
    }

    #[test]
    fn test_flat_series_rsi_neutral() {
        let closes = vec![100.0; 60];
        let bundle = compute_bundle(&candles(&closes), &IndicatorConfig::default()).unwrap();
        assert!((bundle.sma_fast - 100.0).abs() < 1e-9);
        assert!((bundle.bollinger.middle - 100.0).abs() < 1e-9);
    }
}
