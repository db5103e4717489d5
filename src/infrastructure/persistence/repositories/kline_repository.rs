use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::Candle;
use crate::domain::repositories::KlineRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteKlineRepository {
    pool: SqlitePool,
}

impl SqliteKlineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KlineRepository for SqliteKlineRepository {
    async fn save_batch(
        &self,
        exchange_id: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<()> {
        if candles.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for candle in candles {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO klines
                    (exchange_id, symbol, timeframe, timestamp,
                     open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(exchange_id)
            .bind(&candle.symbol)
            .bind(timeframe.to_venue_string())
            .bind(candle.open_time)
            .bind(candle.open.to_string())
            .bind(candle.high.to_string())
            .bind(candle.low.to_string())
            .bind(candle.close.to_string())
            .bind(candle.volume.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to insert kline")?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::database::Database;
    use rust_decimal_macros::dec;

    fn candle(open_time: i64) -> Candle {
        Candle {
            symbol: "BTC/USDT".to_string(),
            timeframe: Timeframe::FifteenMin,
            open_time,
            open: dec!(100),
            high: dec!(110),
            low: dec!(95),
            close: dec!(105),
            volume: dec!(10),
        }
    }

    #[tokio::test]
    async fn test_batch_insert_is_idempotent() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let repo = SqliteKlineRepository::new(db.pool.clone());

        let batch = vec![candle(1000), candle(2000)];
        repo.save_batch("binance", Timeframe::FifteenMin, &batch)
            .await
            .unwrap();
        repo.save_batch("binance", Timeframe::FifteenMin, &batch)
            .await
            .unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM klines")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(row.0, 2);
    }
}
