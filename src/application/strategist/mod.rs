//! Strategist: the slow decision layer.
//!
//! Periodically turns the market environment plus a portfolio summary
//! into a `MarketRegime`, validating the model's output against the
//! cross-field consistency rules before publication. Invalid or
//! unparseable output falls back to the previous still-valid regime, or
//! the conservative default when none exists.

pub mod prompts;

use crate::application::regime_store::RegimeStore;
use crate::domain::decision::{DecisionLayer, DecisionOutcome, DecisionRecord};
use crate::domain::errors::DecisionError;
use crate::domain::market::environment::MarketEnvironment;
use crate::domain::market::regime::{MarketRegime, REGIME_VALIDITY_SECS};
use crate::domain::ports::{ChatModel, ChatOutcome, ChatRequest};
use crate::domain::repositories::DecisionRepository;
use crate::domain::trading::portfolio::Portfolio;
use crate::infrastructure::llm::json::extract_json;
use chrono::{Duration, Utc};
use prompts::PromptStyle;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct StrategistConfig {
    pub style: PromptStyle,
    pub max_symbols_to_trade: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for StrategistConfig {
    fn default() -> Self {
        Self {
            style: PromptStyle::Balanced,
            max_symbols_to_trade: 5,
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

pub struct Strategist {
    model: Arc<dyn ChatModel>,
    store: Arc<RegimeStore>,
    decisions: Arc<dyn DecisionRepository>,
    config: StrategistConfig,
}

/// JSON-safe portfolio digest for the prompts; Decimals become floats.
pub fn portfolio_summary(portfolio: &Portfolio) -> serde_json::Value {
    let positions: Vec<serde_json::Value> = portfolio
        .positions
        .iter()
        .filter(|p| p.is_open)
        .map(|p| {
            serde_json::json!({
                "symbol": p.symbol,
                "side": p.side.to_string(),
                "amount": p.amount.to_f64(),
                "entry_price": p.entry_price.to_f64(),
                "unrealized_pnl": p.unrealized_pnl.to_f64(),
                "leverage": p.leverage,
            })
        })
        .collect();

    serde_json::json!({
        "wallet_balance": portfolio.wallet_balance.to_f64(),
        "available_balance": portfolio.available_balance.to_f64(),
        "unrealized_pnl": portfolio.unrealized_pnl.to_f64(),
        "cash_ratio": portfolio.cash_ratio(),
        "open_positions": positions,
    })
}

impl Strategist {
    pub fn new(
        model: Arc<dyn ChatModel>,
        store: Arc<RegimeStore>,
        decisions: Arc<dyn DecisionRepository>,
        config: StrategistConfig,
    ) -> Self {
        Self {
            model,
            store,
            decisions,
            config,
        }
    }

    /// One strategist tick. Model failure never propagates upward as a
    /// panic or abort; the regime store always ends the tick holding a
    /// usable regime if one can be produced or preserved.
    pub async fn run_tick(
        &self,
        environment: &MarketEnvironment,
        portfolio: &Portfolio,
        symbol_index: &[serde_json::Value],
    ) -> Result<(), DecisionError> {
        if !environment.has_signal() {
            info!("Environment has no core slots filled; skipping strategist tick");
            return Ok(());
        }

        let input_digest = serde_json::json!({
            "environment": environment,
            "portfolio": portfolio_summary(portfolio),
            "symbols": symbol_index,
        });

        let request = ChatRequest {
            system: prompts::strategist_system_prompt(self.config.style),
            user: input_digest.to_string(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            force_json: true,
        };

        // One extra attempt, transport failures only.
        let outcome = match self.model.complete(&request).await {
            Ok(outcome) => outcome,
            Err(first_err) => {
                warn!("Strategist model call failed, retrying once: {first_err}");
                match self.model.complete(&request).await {
                    Ok(outcome) => outcome,
                    Err(second_err) => {
                        self.record(&input_digest, None, DecisionOutcome::ParseFailure, "")
                            .await;
                        self.fall_back("model unavailable").await;
                        return Err(second_err);
                    }
                }
            }
        };

        let parsed = extract_json(&outcome.content);
        let Some(parsed_value) = parsed else {
            self.record(
                &input_digest,
                Some(&outcome),
                DecisionOutcome::ParseFailure,
                &outcome.content,
            )
            .await;
            self.fall_back("unparseable model output").await;
            return Err(DecisionError::InvalidJson {
                snippet: outcome.content.chars().take(120).collect(),
            });
        };

        let mut regime: MarketRegime = match serde_json::from_value(parsed_value.clone()) {
            Ok(regime) => regime,
            Err(e) => {
                self.record(
                    &input_digest,
                    Some(&outcome),
                    DecisionOutcome::ParseFailure,
                    &outcome.content,
                )
                .await;
                self.fall_back("regime shape mismatch").await;
                return Err(DecisionError::InvalidJson {
                    snippet: e.to_string(),
                });
            }
        };

        let now = Utc::now();
        regime.created_at = now;
        if regime.valid_until.is_none() {
            regime.valid_until = Some(now + Duration::seconds(REGIME_VALIDITY_SECS));
        }

        if let Err(violations) = regime.validate(self.config.max_symbols_to_trade) {
            self.record(
                &input_digest,
                Some(&outcome),
                DecisionOutcome::InvariantViolation,
                &outcome.content,
            )
            .await;
            self.fall_back("consistency invariants violated").await;
            return Err(DecisionError::InvariantViolation { violations });
        }

        let mut record = DecisionRecord::new(
            DecisionLayer::Strategic,
            input_digest,
            self.config.style.as_str(),
        );
        record.model_used = outcome.model.clone();
        record.tokens_used = outcome.tokens_used;
        record.latency_ms = outcome.latency_ms;
        record.raw_output = outcome.content.clone();
        record.parsed_output = Some(parsed_value);
        record.outcome = DecisionOutcome::Ok;
        if let Err(e) = self.decisions.save(&record).await {
            error!("Failed to persist strategist decision: {e:#}");
        }

        self.store.put(regime).await;
        Ok(())
    }

    async fn record(
        &self,
        input_digest: &serde_json::Value,
        outcome: Option<&ChatOutcome>,
        decision_outcome: DecisionOutcome,
        raw: &str,
    ) {
        let mut record = DecisionRecord::new(
            DecisionLayer::Strategic,
            input_digest.clone(),
            self.config.style.as_str(),
        );
        if let Some(outcome) = outcome {
            record.model_used = outcome.model.clone();
            record.tokens_used = outcome.tokens_used;
            record.latency_ms = outcome.latency_ms;
        }
        record.raw_output = raw.to_string();
        record.outcome = decision_outcome;
        if let Err(e) = self.decisions.save(&record).await {
            error!("Failed to persist strategist decision: {e:#}");
        }
    }

    /// Keep the previous regime while it is still valid; otherwise
    /// publish the conservative default so the trader is never left
    /// without guidance for a whole strategist interval.
    async fn fall_back(&self, reason: &str) {
        if self.store.current_valid().await.is_some() {
            warn!("Strategist fallback ({reason}): keeping previous valid regime");
        } else {
            warn!("Strategist fallback ({reason}): publishing conservative default regime");
            self.store
                .put(MarketRegime::conservative_default(Utc::now()))
                .await;
        }
    }
}
