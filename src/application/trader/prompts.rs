//! Batched prompt for the tactical layer.

use crate::domain::market::regime::MarketRegime;

/// The four-step decision framework plus the per-mode confidence floors.
/// One prompt covers the whole symbol batch; the model answers with a
/// JSON array, one entry per symbol.
pub fn trader_system_prompt() -> String {
    r#"You are the tactical layer of an autonomous crypto perpetual-futures trading system.
You receive the current market regime, one snapshot per tradeable symbol, and the open
position state. Decide, for EVERY symbol given, whether to enter, exit or hold.

Follow this four-step framework per symbol:

1. STRATEGIC CONSTRAINT - obey the regime: its trading_mode, sizing multiplier and allocation
   weights bound everything you do. Never enter against a panic or defensive stance unless
   the signal is an exit.
2. PER-SYMBOL ANALYSIS - read the indicators (RSI, MACD, moving averages, Bollinger bands),
   the candle tail, funding rate and long/short ratio for direction and conviction.
3. PARAMETER COMPUTATION - for entries pick suggested_price (use the snapshot's last price),
   leverage, stop_loss and take_profit on the correct side of the entry; for exits pick
   close_fraction from {0.5, 0.7, 1.0}.
4. RISK CHECK - state your confidence in [0,1] honestly. Entries below the mode's minimum
   confidence threshold will be discarded, so do not inflate.

Minimum confidence thresholds by trading mode:
aggressive 0.60, normal 0.70, conservative 0.75, defensive 0.85.

Respond ONLY with a JSON array (no markdown, no prose). One object per input symbol, using
the EXACT symbol string you were given, with fields:
symbol, signal_type ("enter_long"|"exit_long"|"enter_short"|"exit_short"|"hold"),
confidence (number), suggested_price (number), suggested_amount (number, optional),
leverage (integer, optional), stop_loss (number, optional), take_profit (number, optional),
close_fraction (0.5|0.7|1.0, exits only), reasoning (1-2 sentences),
supporting_factors (array of strings), risk_factors (array of strings).
A "hold" needs only symbol, signal_type and reasoning."#
        .to_string()
}

/// Compact regime digest included in the batch payload.
pub fn regime_digest(regime: &MarketRegime) -> serde_json::Value {
    serde_json::json!({
        "regime": regime.regime.to_string(),
        "trading_mode": regime.trading_mode.to_string(),
        "min_entry_confidence": regime.trading_mode.min_confidence(),
        "position_sizing_multiplier": regime.position_sizing_multiplier,
        "cash_ratio_target": regime.cash_ratio_target,
        "suggested_allocation": regime.suggested_allocation,
        "narrative": regime.narrative,
        "confidence": regime.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_thresholds_and_fractions() {
        let prompt = trader_system_prompt();
        assert!(prompt.contains("aggressive 0.60"));
        assert!(prompt.contains("defensive 0.85"));
        assert!(prompt.contains("{0.5, 0.7, 1.0}"));
        assert!(prompt.contains("EXACT symbol string"));
    }
}
