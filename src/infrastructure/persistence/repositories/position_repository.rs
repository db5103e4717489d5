use crate::domain::repositories::PositionRepository;
use crate::domain::trading::position::{ClosedPosition, CloseReason, Position};
use crate::domain::trading::types::OrderSide;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::warn;

pub struct SqlitePositionRepository {
    pool: SqlitePool,
}

impl SqlitePositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn try_upsert(&self, position: &Position) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO positions
                (exchange_id, symbol, side, is_open, amount, entry_price,
                 current_price, unrealized_pnl, leverage, stop_loss,
                 take_profit, entry_fee, opened_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(exchange_id, symbol, side, is_open) DO UPDATE SET
                amount = excluded.amount,
                entry_price = excluded.entry_price,
                current_price = excluded.current_price,
                unrealized_pnl = excluded.unrealized_pnl,
                leverage = excluded.leverage,
                stop_loss = excluded.stop_loss,
                take_profit = excluded.take_profit,
                entry_fee = excluded.entry_fee
            "#,
        )
        .bind(&position.exchange_id)
        .bind(&position.symbol)
        .bind(side_str(position.side))
        .bind(position.is_open.then_some(1i64))
        .bind(position.amount.to_string())
        .bind(position.entry_price.to_string())
        .bind(position.current_price.to_string())
        .bind(position.unrealized_pnl.to_string())
        .bind(position.leverage as i64)
        .bind(position.stop_loss.map(|p| p.to_string()))
        .bind(position.take_profit.map(|p| p.to_string()))
        .bind(position.entry_fee.to_string())
        .bind(position.opened_at.timestamp_millis())
        .bind(position.closed_at.map(|t| t.timestamp_millis()))
        .execute(&mut *tx)
        .await
        .context("Failed to upsert position")?;
        tx.commit().await?;
        Ok(())
    }
}

fn side_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

fn decimal_column(row: &SqliteRow, column: &str) -> Option<Decimal> {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .and_then(|s| Decimal::from_str(&s).ok())
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

fn position_from_row(row: &SqliteRow) -> Result<Position> {
    let side: String = row.try_get("side")?;
    let basis = decimal_column(row, "amount").unwrap_or(Decimal::ZERO)
        * decimal_column(row, "entry_price").unwrap_or(Decimal::ZERO);
    let unrealized = decimal_column(row, "unrealized_pnl").unwrap_or(Decimal::ZERO);
    Ok(Position {
        exchange_id: row.try_get("exchange_id")?,
        symbol: row.try_get("symbol")?,
        side: match side.as_str() {
            "buy" => OrderSide::Buy,
            _ => OrderSide::Sell,
        },
        amount: decimal_column(row, "amount").unwrap_or(Decimal::ZERO),
        entry_price: decimal_column(row, "entry_price").unwrap_or(Decimal::ZERO),
        current_price: decimal_column(row, "current_price").unwrap_or(Decimal::ZERO),
        unrealized_pnl: unrealized,
        unrealized_pnl_pct: if basis.is_zero() {
            Decimal::ZERO
        } else {
            unrealized / basis * Decimal::ONE_HUNDRED
        },
        leverage: row.try_get::<i64, _>("leverage")? as u32,
        stop_loss: decimal_column(row, "stop_loss"),
        take_profit: decimal_column(row, "take_profit"),
        entry_fee: decimal_column(row, "entry_fee").unwrap_or(Decimal::ZERO),
        opened_at: millis_to_datetime(row.try_get("opened_at")?),
        closed_at: row
            .try_get::<Option<i64>, _>("closed_at")?
            .map(millis_to_datetime),
        is_open: row.try_get::<Option<i64>, _>("is_open")? == Some(1),
    })
}

fn closed_from_row(row: &SqliteRow) -> Result<ClosedPosition> {
    let side: String = row.try_get("side")?;
    let reason: String = row.try_get("close_reason")?;
    Ok(ClosedPosition {
        exchange_id: row.try_get("exchange_id")?,
        symbol: row.try_get("symbol")?,
        side: match side.as_str() {
            "buy" => OrderSide::Buy,
            _ => OrderSide::Sell,
        },
        amount: decimal_column(row, "amount").unwrap_or(Decimal::ZERO),
        entry_price: decimal_column(row, "entry_price").unwrap_or(Decimal::ZERO),
        entry_fee: decimal_column(row, "entry_fee").unwrap_or(Decimal::ZERO),
        leverage: row.try_get::<i64, _>("leverage")? as u32,
        opened_at: millis_to_datetime(row.try_get("entry_time")?),
        exit_price: decimal_column(row, "exit_price").unwrap_or(Decimal::ZERO),
        exit_time: millis_to_datetime(row.try_get("exit_time")?),
        exit_order_id: row.try_get("exit_order_id")?,
        fee: decimal_column(row, "fee").unwrap_or(Decimal::ZERO),
        realized_pnl: decimal_column(row, "realized_pnl").unwrap_or(Decimal::ZERO),
        realized_pnl_pct: decimal_column(row, "realized_pnl_pct").unwrap_or(Decimal::ZERO),
        holding_duration_secs: row.try_get("holding_duration_seconds")?,
        close_reason: CloseReason::from_str(&reason).unwrap_or(CloseReason::Unknown),
    })
}

#[async_trait]
impl PositionRepository for SqlitePositionRepository {
    async fn upsert(&self, position: &Position) -> Result<()> {
        // The unique index on (exchange, symbol, side, is_open) can race
        // with a concurrent close; one retry resolves the common case.
        match self.try_upsert(position).await {
            Ok(()) => Ok(()),
            Err(first_err) => {
                warn!(
                    symbol = %position.symbol,
                    "Position upsert conflicted, retrying once: {first_err}"
                );
                self.try_upsert(position).await
            }
        }
    }

    async fn find_open(&self, exchange_id: &str) -> Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM positions WHERE exchange_id = ? AND is_open = 1")
            .bind(exchange_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(position_from_row).collect()
    }

    async fn find_open_by(
        &self,
        exchange_id: &str,
        symbol: &str,
        side: OrderSide,
    ) -> Result<Option<Position>> {
        let row = sqlx::query(
            "SELECT * FROM positions WHERE exchange_id = ? AND symbol = ? AND side = ? AND is_open = 1",
        )
        .bind(exchange_id)
        .bind(symbol)
        .bind(side_str(side))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(position_from_row).transpose()
    }

    async fn close_position(&self, position: &Position, closed: &ClosedPosition) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE positions
            SET is_open = NULL, closed_at = ?, amount = ?, current_price = ?
            WHERE exchange_id = ? AND symbol = ? AND side = ? AND is_open = 1
            "#,
        )
        .bind(closed.exit_time.timestamp_millis())
        .bind(position.amount.to_string())
        .bind(closed.exit_price.to_string())
        .bind(&position.exchange_id)
        .bind(&position.symbol)
        .bind(side_str(position.side))
        .execute(&mut *tx)
        .await
        .context("Failed to close position row")?;

        sqlx::query(
            r#"
            INSERT INTO closed_positions
                (exchange_id, symbol, side, amount, entry_price, entry_fee,
                 leverage, entry_time, exit_price, exit_time, exit_order_id,
                 fee, realized_pnl, realized_pnl_pct,
                 holding_duration_seconds, close_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&closed.exchange_id)
        .bind(&closed.symbol)
        .bind(side_str(closed.side))
        .bind(closed.amount.to_string())
        .bind(closed.entry_price.to_string())
        .bind(closed.entry_fee.to_string())
        .bind(closed.leverage as i64)
        .bind(closed.opened_at.timestamp_millis())
        .bind(closed.exit_price.to_string())
        .bind(closed.exit_time.timestamp_millis())
        .bind(&closed.exit_order_id)
        .bind(closed.fee.to_string())
        .bind(closed.realized_pnl.to_string())
        .bind(closed.realized_pnl_pct.to_string())
        .bind(closed.holding_duration_secs)
        .bind(closed.close_reason.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to insert closed position")?;

        tx.commit().await?;
        Ok(())
    }

    async fn closed_since(
        &self,
        exchange_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ClosedPosition>> {
        let rows = sqlx::query(
            "SELECT * FROM closed_positions WHERE exchange_id = ? AND exit_time >= ? ORDER BY exit_time",
        )
        .bind(exchange_id)
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(closed_from_row).collect()
    }
}
