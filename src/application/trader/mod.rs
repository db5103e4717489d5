//! Trader: the fast decision layer.
//!
//! One batched model call per tick turns the frozen regime plus the
//! filtered snapshot map into per-symbol signals. The model's answer is
//! post-matched against the fed symbols: anything missing, invalid or
//! under-confident degrades to `hold` for that symbol only, and a fully
//! unparseable answer degrades the whole batch. Execution consumes the
//! signals as handed over; the trader never re-invokes the model.

pub mod prompts;

use crate::domain::decision::{DecisionLayer, DecisionOutcome, DecisionRecord};
use crate::domain::market::regime::MarketRegime;
use crate::domain::market::types::MarketSnapshot;
use crate::domain::ports::{ChatModel, ChatRequest};
use crate::domain::repositories::DecisionRepository;
use crate::domain::trading::portfolio::Portfolio;
use crate::domain::trading::signal::TradingSignal;
use crate::domain::trading::symbol::matches_base;
use crate::domain::trading::types::OrderSide;
use crate::infrastructure::llm::json::extract_json;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct TraderConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt_style: String,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 4096,
            prompt_style: "balanced".to_string(),
        }
    }
}

pub struct TraderTickResult {
    pub decision_id: Option<i64>,
    pub signals: Vec<TradingSignal>,
}

pub struct Trader {
    model: Arc<dyn ChatModel>,
    decisions: Arc<dyn DecisionRepository>,
    config: TraderConfig,
}

impl Trader {
    pub fn new(
        model: Arc<dyn ChatModel>,
        decisions: Arc<dyn DecisionRepository>,
        config: TraderConfig,
    ) -> Self {
        Self {
            model,
            decisions,
            config,
        }
    }

    /// Symbols from the snapshot map that the regime allows, tolerant of
    /// base ("BTC") versus pair ("BTC/USDT") notation on both sides.
    pub fn filter_symbols(
        regime: &MarketRegime,
        snapshots: &HashMap<String, MarketSnapshot>,
    ) -> Vec<String> {
        let mut symbols: Vec<String> = snapshots
            .iter()
            .filter(|(symbol, snapshot)| {
                snapshot.is_tradeable()
                    && regime
                        .recommended_symbols
                        .iter()
                        .any(|base| matches_base(symbol, base))
                    && !regime
                        .blacklist
                        .iter()
                        .any(|base| matches_base(symbol, base))
            })
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// One tactical tick over a frozen regime and snapshot map.
    pub async fn run_tick(
        &self,
        regime: &MarketRegime,
        snapshots: &HashMap<String, MarketSnapshot>,
        portfolio: &Portfolio,
    ) -> TraderTickResult {
        let symbols = Self::filter_symbols(regime, snapshots);
        if symbols.is_empty() {
            info!("No tradeable symbols under the current regime; trader tick is a no-op");
            return TraderTickResult {
                decision_id: None,
                signals: vec![],
            };
        }

        let payload = self.build_payload(regime, &symbols, snapshots, portfolio);
        let request = ChatRequest {
            system: prompts::trader_system_prompt(),
            user: payload.to_string(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            force_json: false,
        };

        let mut record = DecisionRecord::new(
            DecisionLayer::Tactical,
            payload.clone(),
            &self.config.prompt_style,
        );

        let outcome = match self.model.complete(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Trader model call failed; batch degrades to hold: {e}");
                record.outcome = DecisionOutcome::ParseFailure;
                let decision_id = self.save(record).await;
                return TraderTickResult {
                    decision_id,
                    signals: holds(&symbols, "model unavailable"),
                };
            }
        };

        record.model_used = outcome.model.clone();
        record.tokens_used = outcome.tokens_used;
        record.latency_ms = outcome.latency_ms;
        record.raw_output = outcome.content.clone();

        let parsed = extract_json(&outcome.content).filter(|v| v.is_array());
        let Some(parsed_value) = parsed else {
            warn!("Trader batch output is not a JSON array; all symbols hold");
            record.outcome = DecisionOutcome::ParseFailure;
            let decision_id = self.save(record).await;
            return TraderTickResult {
                decision_id,
                signals: holds(&symbols, "unparseable batch output"),
            };
        };

        record.parsed_output = Some(parsed_value.clone());
        record.outcome = DecisionOutcome::Ok;
        let decision_id = self.save(record).await;

        // Index the model's entries by their exact symbol string.
        let mut by_symbol: HashMap<String, TradingSignal> = HashMap::new();
        if let Some(entries) = parsed_value.as_array() {
            for entry in entries {
                match serde_json::from_value::<TradingSignal>(entry.clone()) {
                    Ok(signal) => {
                        by_symbol.insert(signal.symbol.clone(), signal);
                    }
                    Err(e) => warn!("Discarding malformed batch entry: {e}"),
                }
            }
        }

        let min_confidence = regime.trading_mode.min_confidence();
        let signals = symbols
            .iter()
            .map(|symbol| {
                let Some(signal) = by_symbol.remove(symbol) else {
                    return TradingSignal::hold(symbol.clone(), "no response");
                };
                if let Err(reason) = signal.validate() {
                    warn!("Signal for {symbol} failed validation ({reason}); holding");
                    return TradingSignal::hold(symbol.clone(), reason);
                }
                if signal.signal_type.is_entry() && signal.confidence < min_confidence {
                    info!(
                        "Entry for {symbol} below the {} confidence floor ({:.2} < {:.2}); holding",
                        regime.trading_mode, signal.confidence, min_confidence
                    );
                    return TradingSignal::hold(
                        symbol.clone(),
                        format!(
                            "confidence {:.2} below the {} floor {:.2}",
                            signal.confidence, regime.trading_mode, min_confidence
                        ),
                    );
                }
                signal
            })
            .collect();

        TraderTickResult {
            decision_id,
            signals,
        }
    }

    fn build_payload(
        &self,
        regime: &MarketRegime,
        symbols: &[String],
        snapshots: &HashMap<String, MarketSnapshot>,
        portfolio: &Portfolio,
    ) -> serde_json::Value {
        let symbol_payloads: Vec<serde_json::Value> = symbols
            .iter()
            .filter_map(|symbol| {
                let snapshot = snapshots.get(symbol)?;
                Some(serde_json::json!({
                    "symbol": symbol,
                    "snapshot": snapshot_payload(snapshot),
                    "open_long": portfolio.position(symbol, OrderSide::Buy).map(position_payload),
                    "open_short": portfolio.position(symbol, OrderSide::Sell).map(position_payload),
                }))
            })
            .collect();

        serde_json::json!({
            "regime": prompts::regime_digest(regime),
            "account": crate::application::strategist::portfolio_summary(portfolio),
            "symbols": symbol_payloads,
        })
    }

    async fn save(&self, record: DecisionRecord) -> Option<i64> {
        match self.decisions.save(&record).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Failed to persist trader decision: {e:#}");
                None
            }
        }
    }
}

fn holds(symbols: &[String], reason: &str) -> Vec<TradingSignal> {
    symbols
        .iter()
        .map(|symbol| TradingSignal::hold(symbol.clone(), reason))
        .collect()
}

fn position_payload(position: &crate::domain::trading::position::Position) -> serde_json::Value {
    serde_json::json!({
        "amount": position.amount.to_f64(),
        "entry_price": position.entry_price.to_f64(),
        "unrealized_pnl": position.unrealized_pnl.to_f64(),
        "leverage": position.leverage,
        "stop_loss": position.stop_loss.and_then(|p| p.to_f64()),
        "take_profit": position.take_profit.and_then(|p| p.to_f64()),
    })
}

fn snapshot_payload(snapshot: &MarketSnapshot) -> serde_json::Value {
    let tail: Vec<serde_json::Value> = snapshot
        .candle_tail
        .iter()
        .map(|candle| {
            serde_json::json!([
                candle.open_time,
                candle.open.to_f64(),
                candle.high.to_f64(),
                candle.low.to_f64(),
                candle.close.to_f64(),
                candle.volume.to_f64(),
            ])
        })
        .collect();

    serde_json::json!({
        "last": snapshot.last.to_f64(),
        "change_24h_pct": snapshot.change_24h_pct.to_f64(),
        "indicators": snapshot.indicators,
        "funding_rate": snapshot.funding_rate.and_then(|d| d.to_f64()),
        "long_short_ratio": snapshot.long_short_ratio.and_then(|d| d.to_f64()),
        "quote_volume_24h": snapshot.quote_volume_24h.to_f64(),
        "candle_tail": tail,
    })
}
