//! Configuration loading from environment variables, organized by
//! domain: exchange, model, risk, scheduling.

mod exchange_config;
mod model_config;
mod risk_env_config;
mod schedule_config;

pub use exchange_config::ExchangeEnvConfig;
pub use model_config::ModelEnvConfig;
pub use risk_env_config::RiskEnvConfig;
pub use schedule_config::ScheduleEnvConfig;

use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Aggregated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub exchange: ExchangeEnvConfig,
    pub model: ModelEnvConfig,
    pub risk: RiskEnvConfig,
    pub schedule: ScheduleEnvConfig,

    pub database_url: String,
    /// Tracked instruments in pair form.
    pub symbols: Vec<String>,
    pub max_symbols_to_trade: usize,
    pub primary_timeframe: Timeframe,
    pub candle_window: usize,
    pub news_feed_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let timeframe_str = env::var("PRIMARY_TIMEFRAME").unwrap_or_else(|_| "15m".to_string());
        let primary_timeframe =
            Timeframe::from_str(&timeframe_str).context("Failed to parse PRIMARY_TIMEFRAME")?;

        let symbols: Vec<String> = env::var("DATA_SOURCE_SYMBOLS")
            .unwrap_or_else(|_| "BTC/USDT,ETH/USDT,SOL/USDT".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            anyhow::bail!("DATA_SOURCE_SYMBOLS resolved to an empty list");
        }

        Ok(Self {
            exchange: ExchangeEnvConfig::from_env(),
            model: ModelEnvConfig::from_env(),
            risk: RiskEnvConfig::from_env(),
            schedule: ScheduleEnvConfig::from_env(),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/perpilot.db".to_string()),
            symbols,
            max_symbols_to_trade: env::var("MAX_SYMBOLS_TO_TRADE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            primary_timeframe,
            candle_window: env::var("CANDLE_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            news_feed_url: env::var("NEWS_FEED_URL").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let config = Config::from_env().expect("defaults must load");
        assert_eq!(config.primary_timeframe, Timeframe::FifteenMin);
        assert_eq!(config.candle_window, 100);
        assert!(config.symbols.contains(&"BTC/USDT".to_string()));
        assert!(!config.exchange.enable_trading);
        assert_eq!(config.schedule.trader_interval_secs, 180);
        assert_eq!(config.risk.max_leverage_major, 50);
    }
}
