//! Per-symbol market snapshot assembly (ticker + indicators + derivatives
//! data), fronted by a TTL cache so the Trader always sees a recent view.

use crate::application::market_data::indicators::{self, IndicatorConfig};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::MarketSnapshot;
use crate::domain::ports::ExchangeGateway;
use crate::domain::repositories::KlineRepository;
use crate::infrastructure::cache::TtlCache;
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

/// Tail length of the candle window embedded in each snapshot.
const CANDLE_TAIL_LEN: usize = 10;

pub struct SnapshotBuilderConfig {
    pub primary_timeframe: Timeframe,
    pub candle_window: usize,
    pub snapshot_ttl: Duration,
    pub max_snapshot_age_secs: i64,
    pub max_concurrent_fetches: usize,
    pub indicators: IndicatorConfig,
}

impl Default for SnapshotBuilderConfig {
    fn default() -> Self {
        Self {
            primary_timeframe: Timeframe::FifteenMin,
            candle_window: 100,
            snapshot_ttl: Duration::from_secs(30),
            max_snapshot_age_secs: 30,
            max_concurrent_fetches: 5,
            indicators: IndicatorConfig::default(),
        }
    }
}

pub struct SnapshotBuilder {
    gateway: Arc<dyn ExchangeGateway>,
    kline_repository: Option<Arc<dyn KlineRepository>>,
    exchange_id: String,
    cache: TtlCache<String, MarketSnapshot>,
    /// Symbols covered by the perception loop; lets the symbol index
    /// enumerate the cache.
    tracked: RwLock<Vec<String>>,
    fetch_semaphore: Arc<Semaphore>,
    config: SnapshotBuilderConfig,
}

impl SnapshotBuilder {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        kline_repository: Option<Arc<dyn KlineRepository>>,
        exchange_id: String,
        config: SnapshotBuilderConfig,
    ) -> Self {
        Self {
            gateway,
            kline_repository,
            exchange_id,
            cache: TtlCache::new(config.snapshot_ttl),
            tracked: RwLock::new(Vec::new()),
            fetch_semaphore: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
            config,
        }
    }

    pub async fn set_tracked(&self, symbols: &[String]) {
        *self.tracked.write().await = symbols.to_vec();
    }

    /// Fused snapshot for one symbol, served from cache when fresh.
    pub async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        if let Some(cached) = self.cache.get(&symbol.to_string()).await {
            return Ok(cached);
        }
        self.build(symbol).await
    }

    async fn build(&self, symbol: &str) -> Result<MarketSnapshot> {
        let ticker = self
            .gateway
            .fetch_ticker(symbol)
            .await
            .with_context(|| format!("ticker fetch failed for {symbol}"))?;

        let candles = self
            .gateway
            .fetch_ohlcv(
                symbol,
                self.config.primary_timeframe,
                self.config.candle_window,
            )
            .await
            .with_context(|| format!("ohlcv fetch failed for {symbol}"))?;

        if let Some(repo) = &self.kline_repository
            && let Err(e) = repo
                .save_batch(&self.exchange_id, self.config.primary_timeframe, &candles)
                .await
        {
            warn!("Failed to archive klines for {symbol}: {e}");
        }

        // Derivatives data is optional; a failed fetch leaves the slot empty.
        let funding_rate = match self.gateway.fetch_funding_rate(symbol).await {
            Ok(rate) => rate,
            Err(e) => {
                debug!("funding rate unavailable for {symbol}: {e}");
                None
            }
        };
        let long_short_ratio = match self.gateway.fetch_long_short_ratio(symbol).await {
            Ok(ratio) => ratio,
            Err(e) => {
                debug!("long/short ratio unavailable for {symbol}: {e}");
                None
            }
        };

        // CPU-bound over the whole window; kept off the event loop so a
        // batch of symbols cannot stall it.
        let indicator_config = self.config.indicators;
        let candles_for_compute = candles.clone();
        let bundle = tokio::task::spawn_blocking(move || {
            indicators::compute_bundle(&candles_for_compute, &indicator_config)
        })
        .await
        .context("indicator task panicked")?;

        if bundle.is_none() {
            debug!(
                "{} produced only {} candles; snapshot withheld from the trader",
                symbol,
                candles.len()
            );
        }

        let tail_start = candles.len().saturating_sub(CANDLE_TAIL_LEN);
        let snapshot = MarketSnapshot {
            symbol: symbol.to_string(),
            ts: Utc::now(),
            last: ticker.last,
            change_24h_pct: ticker.percent_change_24h,
            indicators: bundle,
            funding_rate,
            long_short_ratio,
            quote_volume_24h: ticker.quote_volume,
            candle_tail: candles[tail_start..].to_vec(),
        };

        self.cache.put(symbol.to_string(), snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Rebuild snapshots for all tracked symbols, bounded by the fetch
    /// semaphore. Per-symbol failures are logged and skipped.
    pub async fn refresh_all(&self) -> HashMap<String, MarketSnapshot> {
        let symbols = self.tracked.read().await.clone();
        let tasks = symbols.iter().map(|symbol| {
            let semaphore = self.fetch_semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                match self.build(symbol).await {
                    Ok(snapshot) => Some((symbol.clone(), snapshot)),
                    Err(e) => {
                        warn!("Snapshot refresh failed for {symbol}: {e:#}");
                        None
                    }
                }
            }
        });

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Fresh, indicator-bearing snapshots for the given symbols — the
    /// only form the Trader accepts.
    pub async fn tradeable_snapshots(
        &self,
        symbols: &[String],
    ) -> HashMap<String, MarketSnapshot> {
        let now = Utc::now();
        let mut result = HashMap::new();
        for symbol in symbols {
            if let Some(snapshot) = self.cache.get(symbol).await
                && snapshot.is_tradeable()
                && !snapshot.is_stale(now, self.config.max_snapshot_age_secs)
            {
                result.insert(symbol.clone(), snapshot);
            }
        }
        result
    }

    /// Symbol overview for the Strategist prompt, sorted by 24h quote
    /// volume descending.
    pub async fn symbol_index(&self) -> Vec<serde_json::Value> {
        use rust_decimal::prelude::ToPrimitive;

        let mut entries: Vec<(String, MarketSnapshot)> = Vec::new();
        for symbol in self.tracked.read().await.iter() {
            if let Some(snapshot) = self.cache.get(symbol).await {
                entries.push((symbol.clone(), snapshot));
            }
        }
        entries.sort_by(|a, b| b.1.quote_volume_24h.cmp(&a.1.quote_volume_24h));
        entries
            .into_iter()
            .map(|(symbol, snapshot)| {
                serde_json::json!({
                    "symbol": symbol,
                    "last": snapshot.last.to_f64(),
                    "change_24h_pct": snapshot.change_24h_pct.to_f64(),
                    "quote_volume_24h": snapshot.quote_volume_24h.to_f64(),
                })
            })
            .collect()
    }
}
