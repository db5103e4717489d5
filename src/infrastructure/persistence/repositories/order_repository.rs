use crate::domain::repositories::OrderRepository;
use crate::domain::trading::types::{Order, OrderSide, OrderStatus, OrderType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn decimal_column(row: &SqliteRow, column: &str) -> Option<Decimal> {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .and_then(|s| Decimal::from_str(&s).ok())
}

fn order_from_row(row: &SqliteRow) -> Result<Order> {
    let side: String = row.try_get("side")?;
    let order_type: String = row.try_get("order_type")?;
    let status: String = row.try_get("status")?;
    let raw_payload: Option<String> = row.try_get("raw_payload")?;

    Ok(Order {
        id: row.try_get("venue_order_id")?,
        client_order_id: row.try_get("client_order_id")?,
        symbol: row.try_get("symbol")?,
        side: match side.as_str() {
            "buy" => OrderSide::Buy,
            _ => OrderSide::Sell,
        },
        order_type: match order_type.as_str() {
            "limit" => OrderType::Limit,
            "stop_market" => OrderType::StopMarket,
            "take_profit_market" => OrderType::TakeProfitMarket,
            _ => OrderType::Market,
        },
        status: OrderStatus::from_str(&status)?,
        price: decimal_column(row, "price"),
        amount: decimal_column(row, "amount").unwrap_or(Decimal::ZERO),
        filled: decimal_column(row, "filled").unwrap_or(Decimal::ZERO),
        average: decimal_column(row, "average"),
        fee: decimal_column(row, "fee"),
        fee_currency: row.try_get("fee_currency")?,
        stop_price: decimal_column(row, "stop_price"),
        reduce_only: row.try_get::<i64, _>("reduce_only")? != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        linked_decision_id: row.try_get("linked_decision_id")?,
        raw_payload: raw_payload.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn side_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

fn type_str(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::StopMarket => "stop_market",
        OrderType::TakeProfitMarket => "take_profit_market",
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn save(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO orders
                (venue_order_id, client_order_id, symbol, side, order_type,
                 status, price, amount, filled, average, fee, fee_currency,
                 stop_price, reduce_only, created_at, updated_at,
                 linked_decision_id, raw_payload)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(client_order_id) DO UPDATE SET
                venue_order_id = excluded.venue_order_id,
                status = excluded.status,
                filled = excluded.filled,
                average = excluded.average,
                fee = excluded.fee,
                fee_currency = excluded.fee_currency,
                updated_at = excluded.updated_at,
                raw_payload = excluded.raw_payload
            "#,
        )
        .bind(&order.id)
        .bind(&order.client_order_id)
        .bind(&order.symbol)
        .bind(side_str(order.side))
        .bind(type_str(order.order_type))
        .bind(order.status.to_string())
        .bind(order.price.map(|p| p.to_string()))
        .bind(order.amount.to_string())
        .bind(order.filled.to_string())
        .bind(order.average.map(|p| p.to_string()))
        .bind(order.fee.map(|p| p.to_string()))
        .bind(&order.fee_currency)
        .bind(order.stop_price.map(|p| p.to_string()))
        .bind(order.reduce_only as i64)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.linked_decision_id)
        .bind(order.raw_payload.as_ref().map(|v| v.to_string()))
        .execute(&mut *tx)
        .await
        .context("Failed to save order")?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_client_id(&self, client_order_id: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE client_order_id = ?")
            .bind(client_order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_by_venue_id(&self, venue_id: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE venue_order_id = ?")
            .bind(venue_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders WHERE status = ? ORDER BY created_at")
            .bind(status.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::OrderRequest;
    use crate::infrastructure::persistence::database::Database;
    use rust_decimal_macros::dec;

    async fn repo() -> SqliteOrderRepository {
        let db = Database::new("sqlite::memory:").await.unwrap();
        SqliteOrderRepository::new(db.pool)
    }

    fn sample_order(client_id: &str) -> Order {
        let request = OrderRequest {
            symbol: "BTC/USDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            amount: dec!(0.5),
            price: None,
            stop_price: None,
            reduce_only: false,
            client_order_id: client_id.to_string(),
        };
        Order::from_request(&request, 1_700_000_000_000, Some(3))
    }

    #[tokio::test]
    async fn test_save_and_find_roundtrip() {
        let repo = repo().await;
        let order = sample_order("c-1");
        repo.save(&order).await.unwrap();

        let found = repo.find_by_client_id("c-1").await.unwrap().unwrap();
        assert_eq!(found.symbol, "BTC/USDT");
        assert_eq!(found.amount, dec!(0.5));
        assert_eq!(found.status, OrderStatus::Pending);
        assert_eq!(found.linked_decision_id, Some(3));
    }

    #[tokio::test]
    async fn test_replay_same_client_id_keeps_one_row() {
        let repo = repo().await;
        let mut order = sample_order("c-dup");
        repo.save(&order).await.unwrap();

        order.status = OrderStatus::Open;
        order.id = Some("venue-9".to_string());
        repo.save(&order).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let found = repo.find_by_client_id("c-dup").await.unwrap().unwrap();
        assert_eq!(found.status, OrderStatus::Open);
        assert_eq!(found.id.as_deref(), Some("venue-9"));
    }

    #[tokio::test]
    async fn test_find_by_status() {
        let repo = repo().await;
        repo.save(&sample_order("c-a")).await.unwrap();
        let mut open = sample_order("c-b");
        open.status = OrderStatus::Open;
        repo.save(&open).await.unwrap();

        let pending = repo.find_by_status(OrderStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].client_order_id, "c-a");
    }
}
