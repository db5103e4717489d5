//! Shared fixtures: a scripted chat model, in-memory repositories and
//! market-data builders.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use perpilot::domain::errors::DecisionError;
use perpilot::domain::market::regime::{MarketRegime, RegimeKind, RiskLevel, TradingMode};
use perpilot::domain::market::timeframe::Timeframe;
use perpilot::domain::market::types::{
    BollingerValue, Candle, IndicatorBundle, MacdValue, MarketSnapshot,
};
use perpilot::domain::ports::{ChatModel, ChatOutcome, ChatRequest};
use perpilot::infrastructure::persistence::Database;
use perpilot::infrastructure::persistence::repositories::{
    SqliteDecisionRepository, SqliteOrderRepository, SqlitePositionRepository,
    SqliteSnapshotRepository, SqliteTradeRepository,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Chat model that replays queued responses; an empty queue means a
/// provider error.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _request: &ChatRequest) -> Result<ChatOutcome, DecisionError> {
        let next = self.responses.lock().await.pop_front();
        match next {
            Some(content) => Ok(ChatOutcome {
                content,
                tokens_used: Some(256),
                latency_ms: 5,
                model: "scripted".to_string(),
            }),
            None => Err(DecisionError::Provider {
                reason: "script exhausted".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub struct TestRepos {
    pub database: Database,
    pub orders: Arc<SqliteOrderRepository>,
    pub trades: Arc<SqliteTradeRepository>,
    pub positions: Arc<SqlitePositionRepository>,
    pub snapshots: Arc<SqliteSnapshotRepository>,
    pub decisions: Arc<SqliteDecisionRepository>,
}

pub async fn test_repos() -> TestRepos {
    let database = Database::new("sqlite::memory:").await.unwrap();
    TestRepos {
        orders: Arc::new(SqliteOrderRepository::new(database.pool.clone())),
        trades: Arc::new(SqliteTradeRepository::new(database.pool.clone())),
        positions: Arc::new(SqlitePositionRepository::new(database.pool.clone())),
        snapshots: Arc::new(SqliteSnapshotRepository::new(database.pool.clone())),
        decisions: Arc::new(SqliteDecisionRepository::new(database.pool.clone())),
        database,
    }
}

pub fn bull_regime(symbols: &[&str]) -> MarketRegime {
    MarketRegime {
        regime: RegimeKind::Bull,
        risk_level: RiskLevel::Medium,
        trading_mode: TradingMode::Normal,
        recommended_symbols: symbols.iter().map(|s| s.to_string()).collect(),
        blacklist: vec![],
        cash_ratio_target: 0.2,
        position_sizing_multiplier: 1.0,
        suggested_allocation: HashMap::new(),
        narrative: "test regime".to_string(),
        key_drivers: vec![],
        confidence: 0.8,
        created_at: Utc::now(),
        valid_until: None,
    }
}

pub fn indicator_bundle() -> IndicatorBundle {
    IndicatorBundle {
        rsi14: 55.0,
        macd: MacdValue {
            line: 12.0,
            signal: 8.0,
            histogram: 4.0,
        },
        sma_fast: 50_100.0,
        sma_slow: 49_500.0,
        bollinger: BollingerValue {
            upper: 51_000.0,
            middle: 50_000.0,
            lower: 49_000.0,
        },
    }
}

pub fn snapshot(symbol: &str, last: Decimal) -> MarketSnapshot {
    MarketSnapshot {
        symbol: symbol.to_string(),
        ts: Utc::now(),
        last,
        change_24h_pct: dec!(1.5),
        indicators: Some(indicator_bundle()),
        funding_rate: Some(dec!(0.0001)),
        long_short_ratio: Some(dec!(1.2)),
        quote_volume_24h: dec!(1000000),
        candle_tail: vec![Candle {
            symbol: symbol.to_string(),
            timeframe: Timeframe::FifteenMin,
            open_time: Utc::now().timestamp_millis() - 900_000,
            open: last,
            high: last + dec!(100),
            low: last - dec!(100),
            close: last,
            volume: dec!(50),
        }],
    }
}

pub fn snapshot_map(entries: &[(&str, Decimal)]) -> HashMap<String, MarketSnapshot> {
    entries
        .iter()
        .map(|(symbol, last)| (symbol.to_string(), snapshot(symbol, *last)))
        .collect()
}
