use crate::domain::repositories::SnapshotRepository;
use crate::domain::trading::portfolio::PortfolioSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteSnapshotRepository {
    pool: SqlitePool,
}

impl SqliteSnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for SqliteSnapshotRepository {
    async fn save(&self, exchange_id: &str, snapshot: &PortfolioSnapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO portfolio_snapshots
                (exchange_id, snapshot_date, wallet_balance, available_balance,
                 margin_balance, unrealized_pnl, positions, position_count,
                 archive_reason, is_archive)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(exchange_id, snapshot_date) DO UPDATE SET
                wallet_balance = excluded.wallet_balance,
                available_balance = excluded.available_balance,
                margin_balance = excluded.margin_balance,
                unrealized_pnl = excluded.unrealized_pnl,
                positions = excluded.positions,
                position_count = excluded.position_count,
                archive_reason = excluded.archive_reason
            "#,
        )
        .bind(exchange_id)
        .bind(&snapshot.snapshot_date)
        .bind(snapshot.wallet_balance.to_string())
        .bind(snapshot.available_balance.to_string())
        .bind(snapshot.margin_balance.to_string())
        .bind(snapshot.unrealized_pnl.to_string())
        .bind(serde_json::to_string(&snapshot.positions).unwrap_or_else(|_| "[]".to_string()))
        .bind(snapshot.position_count as i64)
        .bind(&snapshot.archive_reason)
        .bind(snapshot.is_archive as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to save portfolio snapshot")?;
        tx.commit().await?;
        Ok(())
    }
}
