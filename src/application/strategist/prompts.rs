//! System prompts for the strategic layer.

use std::str::FromStr;

/// Which system-prompt variant the decision layers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    Conservative,
    Balanced,
    Aggressive,
}

impl PromptStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptStyle::Conservative => "conservative",
            PromptStyle::Balanced => "balanced",
            PromptStyle::Aggressive => "aggressive",
        }
    }
}

impl FromStr for PromptStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(PromptStyle::Conservative),
            "balanced" => Ok(PromptStyle::Balanced),
            "aggressive" => Ok(PromptStyle::Aggressive),
            _ => anyhow::bail!(
                "Invalid prompt style: {}. Must be conservative, balanced or aggressive",
                s
            ),
        }
    }
}

fn style_bias(style: PromptStyle) -> &'static str {
    match style {
        PromptStyle::Conservative => {
            "Bias: capital preservation first. Prefer higher cash ratios within the allowed band, \
             fewer recommended symbols, and conservative or defensive modes unless the evidence \
             for risk-on is overwhelming."
        }
        PromptStyle::Balanced => {
            "Bias: balance opportunity against drawdown risk. Follow the evidence without \
             leaning risk-on or risk-off."
        }
        PromptStyle::Aggressive => {
            "Bias: capture opportunity. Within the allowed bands prefer lower cash ratios and \
             normal or aggressive modes when the evidence supports risk-on, but never bend the \
             consistency rules."
        }
    }
}

/// The five-step analysis framework the model must walk through before
/// emitting a regime.
pub fn strategist_system_prompt(style: PromptStyle) -> String {
    format!(
        r#"You are the strategic layer of an autonomous crypto perpetual-futures trading system.
Your job: read the market environment and produce ONE market regime judgement that will govern
tactical trading for the next hour.

Follow this five-step framework in order:

1. ENVIRONMENT ASSESSMENT - weigh macro conditions (rates, CPI, DXY), equity indices, crypto
   market sentiment (fear & greed, funding, long/short positioning), overall crypto market
   structure, and any news events by impact level.
2. REGIME JUDGEMENT - classify the market as exactly one of "bull", "bear", "sideways", "panic".
   Panic is reserved for active cascading sell-offs, not ordinary corrections.
3. SYMBOL FILTERING - from the provided symbol overview, recommend the base symbols worth
   trading this hour (strongest liquidity and cleanest structure), and blacklist anything
   that should not be touched.
4. RISK PARAMETERS - set trading_mode, cash_ratio_target, position_sizing_multiplier and a
   suggested_allocation consistent with the regime.
5. CONSISTENCY CHECK - before answering, verify every rule below holds; fix your output if not.

Consistency rules (violations cause your entire output to be discarded):
- regime "bull"  => cash_ratio_target in [0.10, 0.30] and trading_mode "aggressive" or "normal"
- regime "bear"  => cash_ratio_target in [0.50, 0.80] and trading_mode "conservative" or "defensive"
- regime "panic" => cash_ratio_target >= 0.80, trading_mode "defensive", recommended_symbols at most ["BTC"]
- position_sizing_multiplier in [0.5, 1.5] and within the mode cap
  (aggressive <= 1.5, normal <= 1.2, conservative <= 1.0, defensive <= 0.8)
- allocation weights sum to at most 1.0

{bias}

Respond ONLY with a JSON object (no markdown, no prose) with fields:
regime, risk_level ("low"|"medium"|"high"|"extreme"), trading_mode, recommended_symbols
(array of base symbols), blacklist (array), cash_ratio_target (number), position_sizing_multiplier
(number), suggested_allocation (object base symbol -> weight), narrative (2-3 sentences),
key_drivers (array of short strings), confidence (number in [0,1])."#,
        bias = style_bias(style)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parsing() {
        assert_eq!(
            PromptStyle::from_str("Balanced").unwrap(),
            PromptStyle::Balanced
        );
        assert!(PromptStyle::from_str("yolo").is_err());
    }

    #[test]
    fn test_prompt_carries_consistency_rules() {
        let prompt = strategist_system_prompt(PromptStyle::Conservative);
        assert!(prompt.contains("[0.10, 0.30]"));
        assert!(prompt.contains("panic"));
        assert!(prompt.contains("capital preservation"));
        // Variants differ only in the bias paragraph
        let aggressive = strategist_system_prompt(PromptStyle::Aggressive);
        assert_ne!(prompt, aggressive);
        assert!(aggressive.contains("[0.10, 0.30]"));
    }
}
