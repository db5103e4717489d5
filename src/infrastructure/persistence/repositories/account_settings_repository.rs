use crate::domain::repositories::AccountSettingsRepository;
use crate::domain::trading::portfolio::AccountSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqliteAccountSettingsRepository {
    pool: SqlitePool,
}

impl SqliteAccountSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountSettingsRepository for SqliteAccountSettingsRepository {
    async fn get(&self, exchange_id: &str) -> Result<Option<AccountSettings>> {
        let row = sqlx::query("SELECT * FROM account_settings WHERE exchange_id = ?")
            .bind(exchange_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let capital: String = row.try_get("initial_capital")?;
            Ok(AccountSettings {
                exchange_id: row.try_get("exchange_id")?,
                initial_capital: Decimal::from_str(&capital).unwrap_or(Decimal::ZERO),
                capital_currency: row.try_get("capital_currency")?,
                set_at: DateTime::from_timestamp_millis(row.try_get("set_at")?)
                    .unwrap_or_else(Utc::now),
            })
        })
        .transpose()
    }

    async fn init_if_missing(&self, settings: &AccountSettings) -> Result<AccountSettings> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO account_settings
                (exchange_id, initial_capital, capital_currency, set_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&settings.exchange_id)
        .bind(settings.initial_capital.to_string())
        .bind(&settings.capital_currency)
        .bind(settings.set_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .context("Failed to initialize account settings")?;
        tx.commit().await?;

        self.get(&settings.exchange_id)
            .await?
            .context("account settings row vanished after init")
    }
}
