//! News digestion: a small model call turns raw headlines into scored
//! events. The path is optional; any provider failure falls back to a
//! local VADER-scored digest without failing the environment tick.

use crate::domain::market::environment::{ImpactLevel, NewsEvent, RawNewsItem};
use crate::domain::ports::{ChatModel, ChatRequest};
use crate::infrastructure::datasources::news_feed::local_sentiment;
use crate::infrastructure::llm::json::extract_json;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const DIGEST_SYSTEM_PROMPT: &str = "You summarise cryptocurrency news for a trading system. \
For each input headline, produce one JSON object with: title (string), summary (one sentence), \
impact_level (one of \"low\", \"medium\", \"high\", \"critical\"), sentiment (number in [-1, 1]), \
related_symbols (array of base symbols like \"BTC\"). \
Respond ONLY with a JSON array, one entry per headline, same order as the input.";

#[derive(Debug, Deserialize)]
struct DigestEntry {
    title: String,
    summary: String,
    impact_level: ImpactLevel,
    sentiment: f64,
    #[serde(default)]
    related_symbols: Vec<String>,
}

pub struct NewsDigester {
    model: Arc<dyn ChatModel>,
    max_tokens: u32,
}

impl NewsDigester {
    pub fn new(model: Arc<dyn ChatModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    pub async fn digest(&self, items: &[RawNewsItem]) -> Vec<NewsEvent> {
        if items.is_empty() {
            return vec![];
        }
        match self.digest_with_model(items).await {
            Some(events) if !events.is_empty() => events,
            _ => {
                debug!("news digestion fell back to local sentiment scoring");
                local_digest(items)
            }
        }
    }

    async fn digest_with_model(&self, items: &[RawNewsItem]) -> Option<Vec<NewsEvent>> {
        let payload: Vec<serde_json::Value> = items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "title": item.title,
                    "content": item.content.chars().take(400).collect::<String>(),
                })
            })
            .collect();

        let request = ChatRequest {
            system: DIGEST_SYSTEM_PROMPT.to_string(),
            user: serde_json::Value::Array(payload).to_string(),
            temperature: 0.0,
            max_tokens: self.max_tokens,
            force_json: false,
        };

        let outcome = self.model.complete(&request).await.ok()?;
        let value = extract_json(&outcome.content)?;
        let entries: Vec<DigestEntry> = serde_json::from_value(value).ok()?;

        Some(
            entries
                .into_iter()
                .zip(items)
                .map(|(entry, item)| NewsEvent {
                    title: entry.title,
                    summary: entry.summary,
                    impact_level: entry.impact_level,
                    sentiment: entry.sentiment.clamp(-1.0, 1.0),
                    related_symbols: entry.related_symbols,
                    published_at: item.published_at,
                })
                .collect(),
        )
    }
}

/// Deterministic digest used when the model path is disabled or errors.
pub fn local_digest(items: &[RawNewsItem]) -> Vec<NewsEvent> {
    items
        .iter()
        .map(|item| {
            let summary: String = item.content.chars().take(160).collect();
            NewsEvent {
                title: item.title.clone(),
                summary: if summary.is_empty() {
                    item.title.clone()
                } else {
                    summary
                },
                impact_level: ImpactLevel::Low,
                sentiment: local_sentiment(&format!("{} {}", item.title, item.content)),
                related_symbols: vec![],
                published_at: item.published_at,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_local_digest_shapes_events() {
        let items = vec![RawNewsItem {
            title: "Bitcoin surges after ETF approval".to_string(),
            content: "Institutional demand drives a rally across majors.".to_string(),
            url: None,
            published_at: Utc::now(),
        }];
        let events = local_digest(&items);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].impact_level, ImpactLevel::Low);
        assert!(events[0].sentiment > 0.0);
    }
}
