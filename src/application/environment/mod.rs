//! Environment builder: parallel fan-in of macro, equities, sentiment,
//! crypto overview and news. Each sub-collector has its own timeout; a
//! failure contributes an empty slot but never fails the tick.

pub mod news_digest;

use crate::domain::market::environment::{MarketEnvironment, SentimentGauge};
use crate::domain::ports::{
    CryptoOverviewProvider, EquityDataProvider, ExchangeGateway, FearGreedProvider,
    MacroDataProvider, NewsProvider,
};
use crate::infrastructure::cache::TtlCache;
use chrono::Utc;
use news_digest::NewsDigester;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const NEWS_BATCH_LIMIT: usize = 10;

pub struct EnvironmentBuilder {
    macro_provider: Option<Arc<dyn MacroDataProvider>>,
    equity_provider: Option<Arc<dyn EquityDataProvider>>,
    fear_greed: Option<Arc<dyn FearGreedProvider>>,
    overview_provider: Option<Arc<dyn CryptoOverviewProvider>>,
    news_provider: Option<Arc<dyn NewsProvider>>,
    digester: Option<NewsDigester>,
    gateway: Arc<dyn ExchangeGateway>,
    cache: TtlCache<(), MarketEnvironment>,
    per_source_timeout: Duration,
}

impl EnvironmentBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        macro_provider: Option<Arc<dyn MacroDataProvider>>,
        equity_provider: Option<Arc<dyn EquityDataProvider>>,
        fear_greed: Option<Arc<dyn FearGreedProvider>>,
        overview_provider: Option<Arc<dyn CryptoOverviewProvider>>,
        news_provider: Option<Arc<dyn NewsProvider>>,
        digester: Option<NewsDigester>,
        gateway: Arc<dyn ExchangeGateway>,
        environment_ttl: Duration,
        per_source_timeout: Duration,
    ) -> Self {
        Self {
            macro_provider,
            equity_provider,
            fear_greed,
            overview_provider,
            news_provider,
            digester,
            gateway,
            cache: TtlCache::new(environment_ttl),
            per_source_timeout,
        }
    }

    /// Latest environment, rebuilt when the cached copy has expired.
    pub async fn environment(&self) -> MarketEnvironment {
        if let Some(cached) = self.cache.get(&()).await {
            return cached;
        }
        self.rebuild().await
    }

    /// Fan-out collection across all configured sources. Failures and
    /// timeouts yield empty slots; siblings are never cancelled.
    pub async fn rebuild(&self) -> MarketEnvironment {
        let per_timeout = self.per_source_timeout;

        let macro_task = async {
            match &self.macro_provider {
                Some(provider) => timeout(per_timeout, provider.fetch_macro()).await.ok()?.ok(),
                None => None,
            }
        };
        let equity_task = async {
            match &self.equity_provider {
                Some(provider) => timeout(per_timeout, provider.fetch_indices())
                    .await
                    .ok()?
                    .ok(),
                None => None,
            }
        };
        let fear_greed_task = async {
            match &self.fear_greed {
                Some(provider) => timeout(per_timeout, provider.fetch_fear_greed())
                    .await
                    .ok()?
                    .ok(),
                None => None,
            }
        };
        let overview_task = async {
            match &self.overview_provider {
                Some(provider) => timeout(per_timeout, provider.fetch_overview())
                    .await
                    .ok()?
                    .ok(),
                None => None,
            }
        };
        let news_task = async {
            match &self.news_provider {
                Some(provider) => timeout(per_timeout, provider.fetch_latest(NEWS_BATCH_LIMIT))
                    .await
                    .ok()?
                    .ok(),
                None => None,
            }
        };
        let funding_task = async {
            let btc = timeout(per_timeout, self.gateway.fetch_funding_rate("BTC/USDT"))
                .await
                .ok()
                .and_then(|r| r.ok())
                .flatten();
            let eth = timeout(per_timeout, self.gateway.fetch_funding_rate("ETH/USDT"))
                .await
                .ok()
                .and_then(|r| r.ok())
                .flatten();
            let ratio = timeout(
                per_timeout,
                self.gateway.fetch_long_short_ratio("BTC/USDT"),
            )
            .await
            .ok()
            .and_then(|r| r.ok())
            .flatten();
            (btc, eth, ratio)
        };

        let (macro_slot, equity_slot, fear_greed_slot, overview_slot, news_slot, funding) = tokio::join!(
            macro_task,
            equity_task,
            fear_greed_task,
            overview_task,
            news_task,
            funding_task
        );

        let (btc_funding, eth_funding, btc_long_short) = funding;
        let sentiment = if fear_greed_slot.is_some()
            || btc_funding.is_some()
            || eth_funding.is_some()
            || btc_long_short.is_some()
        {
            Some(SentimentGauge {
                fear_greed: fear_greed_slot.as_ref().map(|(value, _)| *value),
                label: fear_greed_slot.map(|(_, label)| label),
                btc_funding: btc_funding.and_then(|d| d.to_f64()),
                eth_funding: eth_funding.and_then(|d| d.to_f64()),
                btc_long_short_ratio: btc_long_short.and_then(|d| d.to_f64()),
            })
        } else {
            None
        };

        let news_events = match (news_slot, &self.digester) {
            (Some(items), Some(digester)) if !items.is_empty() => digester.digest(&items).await,
            (Some(items), None) if !items.is_empty() => news_digest::local_digest(&items),
            _ => vec![],
        };

        // News only counts as a slot when a feed is configured.
        let mut total_slots = 4.0;
        let mut filled = 0.0;
        if macro_slot.is_some() {
            filled += 1.0;
        }
        if equity_slot.is_some() {
            filled += 1.0;
        }
        if sentiment.is_some() {
            filled += 1.0;
        }
        if overview_slot.is_some() {
            filled += 1.0;
        }
        if self.news_provider.is_some() {
            total_slots += 1.0;
            if !news_events.is_empty() {
                filled += 1.0;
            }
        }

        let environment = MarketEnvironment {
            ts: Utc::now(),
            macro_indicators: macro_slot,
            stocks: equity_slot,
            sentiment,
            crypto_overview: overview_slot,
            news_events,
            completeness_score: filled / total_slots,
        };

        if environment.has_signal() {
            info!(
                completeness = environment.completeness_score,
                "Environment rebuilt"
            );
        } else {
            warn!("Environment rebuilt with no core slots filled; strategist will skip");
        }
        debug!(
            news = environment.news_events.len(),
            "environment news events"
        );

        self.cache.put((), environment.clone()).await;
        environment
    }
}
