//! RSS headline collector with a local VADER sentiment fallback.

use crate::domain::market::environment::RawNewsItem;
use crate::domain::ports::NewsProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rss::Channel;
use std::collections::HashSet;
use std::io::Cursor;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use vader_sentiment::SentimentIntensityAnalyzer;

pub struct RssNewsProvider {
    url: String,
    client: Client,
    seen_guids: Mutex<HashSet<String>>,
}

impl RssNewsProvider {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            seen_guids: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl NewsProvider for RssNewsProvider {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<RawNewsItem>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to fetch the RSS feed")?;
        let bytes = response
            .bytes()
            .await
            .context("Failed to read RSS feed body")?;
        let channel =
            Channel::read_from(Cursor::new(bytes)).context("Failed to parse the RSS feed")?;

        let mut seen = self.seen_guids.lock().await;
        let mut items = Vec::new();
        for item in channel.items() {
            if items.len() >= limit {
                break;
            }
            let guid = item
                .guid()
                .map(|g| g.value.to_string())
                .or_else(|| item.link().map(String::from))
                .unwrap_or_else(|| item.title().unwrap_or_default().to_string());
            if guid.is_empty() || !seen.insert(guid) {
                continue;
            }

            let published_at = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            items.push(RawNewsItem {
                title: item.title().unwrap_or("No Title").to_string(),
                content: item.description().unwrap_or("").to_string(),
                url: item.link().map(String::from),
                published_at,
            });
        }
        debug!("RSS poll yielded {} unseen items", items.len());
        Ok(items)
    }
}

/// VADER compound score for a headline, in [-1, 1]. Used when the model
/// digestion path is disabled or fails.
pub fn local_sentiment(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    let analyzer = SentimentIntensityAnalyzer::new();
    let scores = analyzer.polarity_scores(text);
    scores.get("compound").copied().unwrap_or(0.0).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_sentiment_direction() {
        let bullish = local_sentiment("Bitcoin surges with massive gains, great success");
        let bearish = local_sentiment("Bitcoin crashes in devastating panic, terrible losses");
        assert!(bullish > 0.0);
        assert!(bearish < 0.0);
        assert_eq!(local_sentiment("   "), 0.0);
    }
}
