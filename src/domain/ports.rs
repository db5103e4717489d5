//! Service trait seams between the application layer and infrastructure.

use crate::domain::errors::{DecisionError, GatewayError};
use crate::domain::market::environment::{
    CryptoOverview, EquityIndices, MacroIndicators, RawNewsItem,
};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::{Candle, Ticker};
use crate::domain::trading::portfolio::AccountBalance;
use crate::domain::trading::position::ExchangePosition;
use crate::domain::trading::types::{Order, OrderRequest, TradeFill};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Venue health plus rate-limiter statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub reachable: bool,
    pub latency_ms: u64,
    pub total_requests: u64,
    pub total_waits: u64,
    pub average_wait_ms: f64,
}

/// Uniform, rate-limited, retrying access to the trading venue.
///
/// Process-wide singleton; the underlying venue's native errors are
/// always wrapped into `GatewayError`.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, GatewayError>;

    /// Ticker read that may be served from a short TTL cache (at most
    /// 60s). Callers opt in explicitly; writes are never cached.
    async fn fetch_ticker_cached(&self, symbol: &str) -> Result<Ticker, GatewayError> {
        self.fetch_ticker(symbol).await
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError>;

    async fn fetch_balance(&self) -> Result<AccountBalance, GatewayError>;

    async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError>;

    async fn fetch_open_orders(&self, symbol: Option<&str>)
    -> Result<Vec<Order>, GatewayError>;

    async fn fetch_my_trades(
        &self,
        symbol: &str,
        since_ms: i64,
    ) -> Result<Vec<TradeFill>, GatewayError>;

    async fn create_order(&self, request: &OrderRequest) -> Result<Order, GatewayError>;

    async fn cancel_order(&self, order_id: &str, symbol: &str) -> Result<(), GatewayError>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), GatewayError>;

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Option<Decimal>, GatewayError>;

    async fn fetch_long_short_ratio(&self, symbol: &str)
    -> Result<Option<Decimal>, GatewayError>;

    async fn health_check(&self) -> Result<GatewayHealth, GatewayError>;
}

/// One chat-completion request. The decision core never passes tools;
/// the prompt carries all data.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a JSON-only response where supported.
    pub force_json: bool,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    pub tokens_used: Option<u32>,
    pub latency_ms: u64,
    pub model: String,
}

/// Chat-completion model client (strategist, trader, news digestion).
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatOutcome, DecisionError>;

    fn model_name(&self) -> &str;
}

/// Macro indicator source (central-bank rate, CPI, DXY). Optional;
/// failures leave the environment slot empty.
#[async_trait]
pub trait MacroDataProvider: Send + Sync {
    async fn fetch_macro(&self) -> Result<MacroIndicators>;
}

/// Equity index source (S&P 500, NASDAQ).
#[async_trait]
pub trait EquityDataProvider: Send + Sync {
    async fn fetch_indices(&self) -> Result<EquityIndices>;
}

/// Fear & Greed style market sentiment source.
#[async_trait]
pub trait FearGreedProvider: Send + Sync {
    /// Returns the index value (0-100) and its label.
    async fn fetch_fear_greed(&self) -> Result<(u8, String)>;
}

/// Whole-market overview source (total cap, BTC dominance).
#[async_trait]
pub trait CryptoOverviewProvider: Send + Sync {
    async fn fetch_overview(&self) -> Result<CryptoOverview>;
}

/// Headline feed; items are digested downstream.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<RawNewsItem>>;
}
