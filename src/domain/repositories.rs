//! Repository trait seams for the persistence layer.
//!
//! The DAO exclusively owns persistent rows; every implementation runs
//! its writes inside a transaction with explicit commit/rollback.

use crate::domain::decision::{DecisionOutcome, DecisionRecord};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::Candle;
use crate::domain::trading::portfolio::{AccountSettings, PortfolioSnapshot};
use crate::domain::trading::position::{ClosedPosition, Position};
use crate::domain::trading::types::{Order, OrderSide, OrderStatus, TradeFill};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Orders, keyed by the client order id (unique index blocks
/// double-writes from a replayed submission).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or update by `client_order_id`.
    async fn save(&self, order: &Order) -> Result<()>;

    async fn find_by_client_id(&self, client_order_id: &str) -> Result<Option<Order>>;

    async fn find_by_venue_id(&self, venue_id: &str) -> Result<Option<Order>>;

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    async fn count(&self) -> Result<i64>;
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn save(&self, fill: &TradeFill) -> Result<()>;

    /// Most recent persisted fill timestamp for a symbol; the sync
    /// cursor starts after it.
    async fn latest_timestamp(&self, symbol: &str) -> Result<Option<i64>>;
}

/// Open and closed positions. At most one open row may exist per
/// (exchange, symbol, side); the unique index enforces it and `upsert`
/// retries once on a conflict.
#[async_trait]
pub trait PositionRepository: Send + Sync {
    async fn upsert(&self, position: &Position) -> Result<()>;

    async fn find_open(&self, exchange_id: &str) -> Result<Vec<Position>>;

    async fn find_open_by(
        &self,
        exchange_id: &str,
        symbol: &str,
        side: OrderSide,
    ) -> Result<Option<Position>>;

    /// Atomically mark the position row closed and insert the closed
    /// record.
    async fn close_position(&self, position: &Position, closed: &ClosedPosition) -> Result<()>;

    async fn closed_since(&self, exchange_id: &str, since: DateTime<Utc>)
    -> Result<Vec<ClosedPosition>>;
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn save(&self, exchange_id: &str, snapshot: &PortfolioSnapshot) -> Result<()>;
}

#[async_trait]
pub trait DecisionRepository: Send + Sync {
    /// Persist the record and return its row id.
    async fn save(&self, record: &DecisionRecord) -> Result<i64>;

    /// Back-annotate an existing decision with what became of it.
    async fn update_outcome(&self, id: i64, outcome: DecisionOutcome, note: Option<&str>)
    -> Result<()>;
}

#[async_trait]
pub trait KlineRepository: Send + Sync {
    /// Idempotent batch insert; duplicates on
    /// (exchange, symbol, timeframe, timestamp) are ignored.
    async fn save_batch(
        &self,
        exchange_id: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<()>;
}

#[async_trait]
pub trait AccountSettingsRepository: Send + Sync {
    async fn get(&self, exchange_id: &str) -> Result<Option<AccountSettings>>;

    /// Write the baseline once; later calls with the same exchange are
    /// no-ops returning the existing row.
    async fn init_if_missing(&self, settings: &AccountSettings) -> Result<AccountSettings>;
}
