use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Directional bias of the whole market, as judged by the Strategist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeKind {
    Bull,
    Bear,
    Sideways,
    Panic,
}

impl fmt::Display for RegimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeKind::Bull => write!(f, "bull"),
            RegimeKind::Bear => write!(f, "bear"),
            RegimeKind::Sideways => write!(f, "sideways"),
            RegimeKind::Panic => write!(f, "panic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

/// How aggressively the Trader is allowed to act for the regime window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Aggressive,
    Normal,
    Conservative,
    Defensive,
}

impl TradingMode {
    /// Minimum confidence an entry signal must reach in this mode.
    pub fn min_confidence(&self) -> f64 {
        match self {
            TradingMode::Aggressive => 0.60,
            TradingMode::Normal => 0.70,
            TradingMode::Conservative => 0.75,
            TradingMode::Defensive => 0.85,
        }
    }

    /// Upper bound on the sizing multiplier for this mode. Caps decrease
    /// with caution so that a valid multiplier is monotone across modes.
    pub fn sizing_cap(&self) -> f64 {
        match self {
            TradingMode::Aggressive => 1.5,
            TradingMode::Normal => 1.2,
            TradingMode::Conservative => 1.0,
            TradingMode::Defensive => 0.8,
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Aggressive => write!(f, "aggressive"),
            TradingMode::Normal => write!(f, "normal"),
            TradingMode::Conservative => write!(f, "conservative"),
            TradingMode::Defensive => write!(f, "defensive"),
        }
    }
}

/// Default regime validity window.
pub const REGIME_VALIDITY_SECS: i64 = 3600;

/// Macro judgement produced by the Strategist and consumed read-only by
/// the Trader for the duration of its validity window. Immutable after
/// publication; ticks operate on clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRegime {
    pub regime: RegimeKind,
    pub risk_level: RiskLevel,
    pub trading_mode: TradingMode,
    /// Base symbols (e.g. "BTC"), capped at the configured maximum.
    pub recommended_symbols: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    pub cash_ratio_target: f64,
    pub position_sizing_multiplier: f64,
    #[serde(default)]
    pub suggested_allocation: HashMap<String, f64>,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub key_drivers: Vec<String>,
    pub confidence: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl MarketRegime {
    /// Effective end of the validity window.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.valid_until
            .unwrap_or(self.created_at + Duration::seconds(REGIME_VALIDITY_SECS))
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.created_at <= now && now < self.expires_at()
    }

    /// Whether the regime allows trading this base symbol.
    pub fn allows_base(&self, base: &str) -> bool {
        self.recommended_symbols.iter().any(|s| s == base)
            && !self.blacklist.iter().any(|s| s == base)
    }

    /// Cross-field consistency rules. A regime failing any of these is
    /// rejected by the Strategist and replaced with a fallback.
    pub fn validate(&self, max_symbols: usize) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();

        if !(0.0..=1.0).contains(&self.cash_ratio_target) {
            violations.push(format!(
                "cash_ratio_target {} outside [0, 1]",
                self.cash_ratio_target
            ));
        }
        if !(0.5..=1.5).contains(&self.position_sizing_multiplier) {
            violations.push(format!(
                "position_sizing_multiplier {} outside [0.5, 1.5]",
                self.position_sizing_multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            violations.push(format!("confidence {} outside [0, 1]", self.confidence));
        }
        if self.recommended_symbols.len() > max_symbols {
            violations.push(format!(
                "{} recommended symbols exceeds the cap of {}",
                self.recommended_symbols.len(),
                max_symbols
            ));
        }

        let allocation_sum: f64 = self.suggested_allocation.values().sum();
        if allocation_sum > 1.0 + 1e-9 {
            violations.push(format!("allocation weights sum to {allocation_sum} > 1"));
        }

        match self.regime {
            RegimeKind::Bull => {
                if !(0.10..=0.30).contains(&self.cash_ratio_target) {
                    violations.push(format!(
                        "bull regime requires cash_ratio_target in [0.10, 0.30], got {}",
                        self.cash_ratio_target
                    ));
                }
                if !matches!(
                    self.trading_mode,
                    TradingMode::Aggressive | TradingMode::Normal
                ) {
                    violations.push(format!(
                        "bull regime requires aggressive or normal mode, got {}",
                        self.trading_mode
                    ));
                }
            }
            RegimeKind::Bear => {
                if !(0.50..=0.80).contains(&self.cash_ratio_target) {
                    violations.push(format!(
                        "bear regime requires cash_ratio_target in [0.50, 0.80], got {}",
                        self.cash_ratio_target
                    ));
                }
                if !matches!(
                    self.trading_mode,
                    TradingMode::Conservative | TradingMode::Defensive
                ) {
                    violations.push(format!(
                        "bear regime requires conservative or defensive mode, got {}",
                        self.trading_mode
                    ));
                }
            }
            RegimeKind::Panic => {
                if self.cash_ratio_target < 0.80 {
                    violations.push(format!(
                        "panic regime requires cash_ratio_target >= 0.80, got {}",
                        self.cash_ratio_target
                    ));
                }
                if self.trading_mode != TradingMode::Defensive {
                    violations.push(format!(
                        "panic regime requires defensive mode, got {}",
                        self.trading_mode
                    ));
                }
                if self.recommended_symbols.iter().any(|s| s != "BTC") {
                    violations.push(format!(
                        "panic regime restricts recommendations to BTC, got {:?}",
                        self.recommended_symbols
                    ));
                }
            }
            RegimeKind::Sideways => {}
        }

        if self.position_sizing_multiplier > self.trading_mode.sizing_cap() {
            violations.push(format!(
                "position_sizing_multiplier {} exceeds the {} cap of {}",
                self.position_sizing_multiplier,
                self.trading_mode,
                self.trading_mode.sizing_cap()
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Fallback published when the Strategist cannot produce a valid
    /// regime and no previous one is still in its window.
    pub fn conservative_default(now: DateTime<Utc>) -> Self {
        Self {
            regime: RegimeKind::Sideways,
            risk_level: RiskLevel::Medium,
            trading_mode: TradingMode::Normal,
            recommended_symbols: vec!["BTC".to_string()],
            blacklist: vec![],
            cash_ratio_target: 0.4,
            position_sizing_multiplier: 0.8,
            suggested_allocation: HashMap::from([("BTC".to_string(), 0.6)]),
            narrative: "Fallback regime: decision layer unavailable".to_string(),
            key_drivers: vec![],
            confidence: 0.3,
            created_at: now,
            valid_until: Some(now + Duration::seconds(REGIME_VALIDITY_SECS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bull_regime() -> MarketRegime {
        MarketRegime {
            regime: RegimeKind::Bull,
            risk_level: RiskLevel::Medium,
            trading_mode: TradingMode::Normal,
            recommended_symbols: vec!["BTC".to_string(), "ETH".to_string()],
            blacklist: vec!["DOGE".to_string()],
            cash_ratio_target: 0.2,
            position_sizing_multiplier: 1.1,
            suggested_allocation: HashMap::from([
                ("BTC".to_string(), 0.5),
                ("ETH".to_string(), 0.3),
            ]),
            narrative: "Broad risk-on".to_string(),
            key_drivers: vec!["ETF inflows".to_string()],
            confidence: 0.8,
            created_at: Utc::now(),
            valid_until: None,
        }
    }

    #[test]
    fn test_valid_bull_regime() {
        assert!(bull_regime().validate(5).is_ok());
    }

    #[test]
    fn test_bull_cash_ratio_bounds() {
        let mut regime = bull_regime();
        regime.cash_ratio_target = 0.5;
        let violations = regime.validate(5).unwrap_err();
        assert!(violations.iter().any(|v| v.contains("bull regime")));
    }

    #[test]
    fn test_panic_consistency_rejected() {
        // Panic with low cash and an aggressive mode must fail on all
        // three panic rules at once.
        let mut regime = bull_regime();
        regime.regime = RegimeKind::Panic;
        regime.cash_ratio_target = 0.30;
        regime.trading_mode = TradingMode::Aggressive;
        regime.position_sizing_multiplier = 1.2;
        let violations = regime.validate(5).unwrap_err();
        assert!(violations.iter().any(|v| v.contains(">= 0.80")));
        assert!(violations.iter().any(|v| v.contains("defensive")));
        assert!(violations.iter().any(|v| v.contains("BTC")));
    }

    #[test]
    fn test_sizing_multiplier_mode_cap() {
        let mut regime = bull_regime();
        regime.regime = RegimeKind::Bear;
        regime.cash_ratio_target = 0.6;
        regime.trading_mode = TradingMode::Defensive;
        regime.position_sizing_multiplier = 1.0; // above the defensive cap of 0.8
        let violations = regime.validate(5).unwrap_err();
        assert!(violations.iter().any(|v| v.contains("cap")));
    }

    #[test]
    fn test_validity_window() {
        let regime = bull_regime();
        let now = Utc::now();
        assert!(regime.is_valid_at(now));
        assert!(!regime.is_valid_at(now + Duration::seconds(REGIME_VALIDITY_SECS + 1)));
        assert!(!regime.is_valid_at(now - Duration::seconds(10)));
    }

    #[test]
    fn test_allows_base_respects_blacklist() {
        let regime = bull_regime();
        assert!(regime.allows_base("BTC"));
        assert!(!regime.allows_base("SOL"));
        let mut blacklisted = bull_regime();
        blacklisted.blacklist = vec!["ETH".to_string()];
        assert!(!blacklisted.allows_base("ETH"));
    }

    #[test]
    fn test_conservative_default_is_valid() {
        let fallback = MarketRegime::conservative_default(Utc::now());
        assert!(fallback.validate(5).is_ok());
        assert_eq!(fallback.regime, RegimeKind::Sideways);
        assert_eq!(fallback.trading_mode, TradingMode::Normal);
    }

    #[test]
    fn test_regime_json_roundtrip() {
        let regime = bull_regime();
        let json = serde_json::to_string(&regime).unwrap();
        let back: MarketRegime = serde_json::from_str(&json).unwrap();
        assert_eq!(back.regime, regime.regime);
        assert_eq!(back.trading_mode, regime.trading_mode);
        assert_eq!(back.recommended_symbols, regime.recommended_symbols);
        assert!((back.cash_ratio_target - regime.cash_ratio_target).abs() < 1e-12);
    }

    #[test]
    fn test_mode_confidence_floors_monotone() {
        assert!(
            TradingMode::Defensive.min_confidence() > TradingMode::Conservative.min_confidence()
        );
        assert!(TradingMode::Conservative.min_confidence() > TradingMode::Normal.min_confidence());
        assert!(TradingMode::Normal.min_confidence() > TradingMode::Aggressive.min_confidence());
    }
}
