use crate::domain::market::environment::CryptoOverview;
use crate::domain::ports::CryptoOverviewProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    total_market_cap: HashMap<String, f64>,
    market_cap_percentage: HashMap<String, f64>,
    market_cap_change_percentage_24h_usd: Option<f64>,
}

/// Whole-market overview (total cap, BTC dominance) from the CoinGecko
/// global endpoint.
pub struct CoinGeckoOverview {
    client: Client,
    url: String,
}

impl CoinGeckoOverview {
    pub fn new() -> Self {
        Self::with_url("https://api.coingecko.com/api/v3/global".to_string())
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

impl Default for CoinGeckoOverview {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CryptoOverviewProvider for CoinGeckoOverview {
    async fn fetch_overview(&self) -> Result<CryptoOverview> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach the global market endpoint")?;

        if !response.status().is_success() {
            anyhow::bail!("global market endpoint returned {}", response.status());
        }

        let body: GlobalResponse = response
            .json()
            .await
            .context("Failed to parse global market response")?;

        Ok(CryptoOverview {
            total_market_cap: body.data.total_market_cap.get("usd").copied(),
            btc_dominance: body.data.market_cap_percentage.get("btc").copied(),
            total_change_24h: body.data.market_cap_change_percentage_24h_usd,
        })
    }
}
