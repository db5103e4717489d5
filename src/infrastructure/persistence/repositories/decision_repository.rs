use crate::domain::decision::{DecisionOutcome, DecisionRecord};
use crate::domain::repositories::DecisionRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteDecisionRepository {
    pool: SqlitePool,
}

impl SqliteDecisionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionRepository for SqliteDecisionRepository {
    async fn save(&self, record: &DecisionRecord) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO decisions
                (layer, prompt_style, model_used, tokens_used, latency_ms,
                 input, output, raw_output, outcome, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.layer.to_string())
        .bind(&record.prompt_style)
        .bind(&record.model_used)
        .bind(record.tokens_used.map(|t| t as i64))
        .bind(record.latency_ms as i64)
        .bind(record.input_digest.to_string())
        .bind(record.parsed_output.as_ref().map(|v| v.to_string()))
        .bind(&record.raw_output)
        .bind(record.outcome.to_string())
        .bind(record.created_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .context("Failed to save decision record")?;
        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_outcome(
        &self,
        id: i64,
        outcome: DecisionOutcome,
        note: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE decisions SET outcome = ?, outcome_note = ? WHERE id = ?")
            .bind(outcome.to_string())
            .bind(note)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update decision outcome")?;
        tx.commit().await?;
        Ok(())
    }
}
