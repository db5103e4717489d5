//! Read-only cached portfolio view.
//!
//! The account synchronizer rebuilds the cache; the strategist, trader
//! and risk manager read from it. This manager never calls the venue —
//! it is a pure projection over sync output plus closed-position history.

use crate::domain::repositories::PositionRepository;
use crate::domain::trading::portfolio::Portfolio;
use crate::domain::trading::position::Position;
use crate::domain::trading::types::OrderSide;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    pub trade_count: usize,
    pub win_count: usize,
    pub win_rate: f64,
    pub realized_pnl: Decimal,
    pub total_fees: Decimal,
}

pub struct PortfolioManager {
    cached: RwLock<Portfolio>,
    positions: Arc<dyn PositionRepository>,
    exchange_id: String,
}

impl PortfolioManager {
    pub fn new(positions: Arc<dyn PositionRepository>, exchange_id: String) -> Self {
        Self {
            cached: RwLock::new(Portfolio::empty()),
            positions,
            exchange_id,
        }
    }

    pub async fn portfolio(&self) -> Portfolio {
        self.cached.read().await.clone()
    }

    pub async fn position(&self, symbol: &str, side: OrderSide) -> Option<Position> {
        self.cached.read().await.position(symbol, side).cloned()
    }

    /// Single writer: the account synchronizer.
    pub async fn replace(&self, portfolio: Portfolio) {
        *self.cached.write().await = portfolio;
    }

    /// Today's realised PnL (UTC day) plus current unrealised PnL; the
    /// figure the daily circuit breaker watches.
    pub async fn daily_pnl(&self, now: DateTime<Utc>) -> Result<Decimal> {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(now);
        let realized: Decimal = self
            .positions
            .closed_since(&self.exchange_id, midnight)
            .await?
            .iter()
            .map(|closed| closed.realized_pnl)
            .sum();
        let unrealized = self.cached.read().await.unrealized_pnl;
        Ok(realized + unrealized)
    }

    pub async fn metrics(&self, range_days: i64) -> Result<PerformanceMetrics> {
        let since = Utc::now() - Duration::days(range_days);
        let closed = self.positions.closed_since(&self.exchange_id, since).await?;

        let trade_count = closed.len();
        let win_count = closed
            .iter()
            .filter(|c| c.realized_pnl > Decimal::ZERO)
            .count();
        let realized_pnl: Decimal = closed.iter().map(|c| c.realized_pnl).sum();
        let total_fees: Decimal = closed.iter().map(|c| c.fee + c.entry_fee).sum();

        Ok(PerformanceMetrics {
            trade_count,
            win_count,
            win_rate: if trade_count == 0 {
                0.0
            } else {
                win_count as f64 / trade_count as f64
            },
            realized_pnl,
            total_fees,
        })
    }
}
