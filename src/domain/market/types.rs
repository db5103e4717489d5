use crate::domain::market::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 24h rolling ticker for a single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub timestamp: i64,
    pub last: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub high_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    pub base_volume: Decimal,
    pub quote_volume: Decimal,
    pub percent_change_24h: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// `low <= min(open, close) <= max(open, close) <= high`, volume >= 0.
    pub fn is_well_formed(&self) -> bool {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        self.low <= body_low && body_high <= self.high && self.volume >= Decimal::ZERO
    }
}

/// MACD line/signal/histogram triple.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BollingerValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Technical indicator bundle computed from the primary-timeframe window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub rsi14: f64,
    pub macd: MacdValue,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub bollinger: BollingerValue,
}

/// Per-symbol fused view handed to the Trader.
///
/// Regenerated on every perception tick; a snapshot older than the
/// configured maximum age is rebuilt rather than served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub ts: DateTime<Utc>,
    pub last: Decimal,
    pub change_24h_pct: Decimal,
    /// None when fewer than the minimum candles were available; such a
    /// snapshot is never forwarded to the Trader.
    pub indicators: Option<IndicatorBundle>,
    pub funding_rate: Option<Decimal>,
    pub long_short_ratio: Option<Decimal>,
    pub quote_volume_24h: Decimal,
    /// Tail of the primary-timeframe candle window, newest last.
    pub candle_tail: Vec<Candle>,
}

impl MarketSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.ts
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: i64) -> bool {
        self.age(now).num_seconds() >= max_age_secs
    }

    /// Whether this snapshot is complete enough for the Trader.
    pub fn is_tradeable(&self) -> bool {
        self.indicators.is_some()
    }
}
