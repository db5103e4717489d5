use crate::domain::repositories::TradeRepository;
use crate::domain::trading::types::{OrderSide, TradeFill};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteTradeRepository {
    pool: SqlitePool,
}

impl SqliteTradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeRepository for SqliteTradeRepository {
    async fn save(&self, fill: &TradeFill) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO trades
                (id, order_id, symbol, side, price, amount, cost, fee,
                 fee_currency, ts, is_liquidation)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fill.id)
        .bind(&fill.order_id)
        .bind(&fill.symbol)
        .bind(match fill.side {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        })
        .bind(fill.price.to_string())
        .bind(fill.amount.to_string())
        .bind(fill.cost.to_string())
        .bind(fill.fee.to_string())
        .bind(&fill.fee_currency)
        .bind(fill.timestamp)
        .bind(fill.is_liquidation as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to save trade fill")?;
        tx.commit().await?;
        Ok(())
    }

    async fn latest_timestamp(&self, symbol: &str) -> Result<Option<i64>> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(ts) FROM trades WHERE symbol = ?")
            .bind(symbol)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::database::Database;
    use rust_decimal_macros::dec;

    fn fill(id: &str, ts: i64) -> TradeFill {
        TradeFill {
            id: id.to_string(),
            order_id: "o-1".to_string(),
            symbol: "BTC/USDT".to_string(),
            side: OrderSide::Buy,
            price: dec!(50000),
            amount: dec!(0.1),
            cost: dec!(5000),
            fee: dec!(2),
            fee_currency: Some("USDT".to_string()),
            timestamp: ts,
            is_liquidation: false,
            reduce_only: false,
        }
    }

    #[tokio::test]
    async fn test_save_and_cursor() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let repo = SqliteTradeRepository::new(db.pool);

        assert_eq!(repo.latest_timestamp("BTC/USDT").await.unwrap(), None);

        repo.save(&fill("t-1", 100)).await.unwrap();
        repo.save(&fill("t-2", 200)).await.unwrap();
        // Duplicate id is ignored, not duplicated
        repo.save(&fill("t-2", 200)).await.unwrap();

        assert_eq!(repo.latest_timestamp("BTC/USDT").await.unwrap(), Some(200));
        assert_eq!(repo.latest_timestamp("ETH/USDT").await.unwrap(), None);
    }
}
