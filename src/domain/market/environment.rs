use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro-economic backdrop. Every field is optional; a missing source
/// leaves its slot empty without failing the collection tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacroIndicators {
    pub fed_rate: Option<f64>,
    pub cpi: Option<f64>,
    pub dxy: Option<f64>,
    pub dxy_change_24h: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquityIndices {
    pub sp500: Option<f64>,
    pub sp500_change_24h: Option<f64>,
    pub nasdaq: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentGauge {
    /// Fear & Greed index, 0 (extreme fear) to 100 (extreme greed).
    pub fear_greed: Option<u8>,
    pub label: Option<String>,
    pub btc_funding: Option<f64>,
    pub eth_funding: Option<f64>,
    pub btc_long_short_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CryptoOverview {
    pub total_market_cap: Option<f64>,
    pub btc_dominance: Option<f64>,
    pub total_change_24h: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactLevel::Low => write!(f, "low"),
            ImpactLevel::Medium => write!(f, "medium"),
            ImpactLevel::High => write!(f, "high"),
            ImpactLevel::Critical => write!(f, "critical"),
        }
    }
}

/// A digested news item as fed to the Strategist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub title: String,
    pub summary: String,
    pub impact_level: ImpactLevel,
    /// Sentiment score in [-1, 1].
    pub sentiment: f64,
    pub related_symbols: Vec<String>,
    pub published_at: DateTime<Utc>,
}

/// A raw headline as pulled from a feed, before digestion.
#[derive(Debug, Clone)]
pub struct RawNewsItem {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Multi-source aggregate consumed by the Strategist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEnvironment {
    pub ts: DateTime<Utc>,
    pub macro_indicators: Option<MacroIndicators>,
    pub stocks: Option<EquityIndices>,
    pub sentiment: Option<SentimentGauge>,
    pub crypto_overview: Option<CryptoOverview>,
    pub news_events: Vec<NewsEvent>,
    /// Filled slots / total slots, in [0, 1].
    pub completeness_score: f64,
}

impl MarketEnvironment {
    /// The Strategist tick is skipped unless at least one of macro,
    /// sentiment or crypto overview came through.
    pub fn has_signal(&self) -> bool {
        self.macro_indicators.is_some()
            || self.sentiment.is_some()
            || self.crypto_overview.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_environment() -> MarketEnvironment {
        MarketEnvironment {
            ts: Utc::now(),
            macro_indicators: None,
            stocks: None,
            sentiment: None,
            crypto_overview: None,
            news_events: vec![],
            completeness_score: 0.0,
        }
    }

    #[test]
    fn test_has_signal_requires_one_core_slot() {
        let mut env = empty_environment();
        assert!(!env.has_signal());

        env.stocks = Some(EquityIndices::default());
        assert!(!env.has_signal(), "stocks alone do not satisfy the gate");

        env.sentiment = Some(SentimentGauge {
            fear_greed: Some(40),
            ..Default::default()
        });
        assert!(env.has_signal());
    }

    #[test]
    fn test_impact_level_ordering() {
        assert!(ImpactLevel::Critical > ImpactLevel::High);
        assert!(ImpactLevel::Medium > ImpactLevel::Low);
    }

    #[test]
    fn test_impact_level_serde_lowercase() {
        let level: ImpactLevel = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(level, ImpactLevel::Critical);
        assert_eq!(serde_json::to_string(&ImpactLevel::Low).unwrap(), "\"low\"");
    }
}
