use crate::domain::ports::FearGreedProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
struct AlternativeMeResponse {
    data: Vec<AlternativeMeData>,
}

#[derive(Debug, Deserialize)]
struct AlternativeMeData {
    value: String,
    value_classification: String,
}

/// Crypto Fear & Greed index from alternative.me.
pub struct AlternativeMeFearGreed {
    client: Client,
    url: String,
}

impl AlternativeMeFearGreed {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url: "https://api.alternative.me/fng/".to_string(),
        }
    }

    pub fn with_url(url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url,
        }
    }
}

impl Default for AlternativeMeFearGreed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FearGreedProvider for AlternativeMeFearGreed {
    async fn fetch_fear_greed(&self) -> Result<(u8, String)> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to reach alternative.me")?;

        if !response.status().is_success() {
            anyhow::bail!("alternative.me returned status {}", response.status());
        }

        let body: AlternativeMeResponse = response
            .json()
            .await
            .context("Failed to parse alternative.me response")?;

        let data = body
            .data
            .first()
            .context("alternative.me response carried no data points")?;
        let value: u8 = data
            .value
            .parse()
            .context("Failed to parse fear & greed value")?;

        info!(
            "Fear & Greed: {} ({})",
            value, data.value_classification
        );
        Ok((value.min(100), data.value_classification.clone()))
    }
}
