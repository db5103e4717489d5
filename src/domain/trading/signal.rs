use crate::domain::trading::types::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    EnterLong,
    ExitLong,
    EnterShort,
    ExitShort,
    Hold,
}

impl SignalType {
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalType::EnterLong | SignalType::EnterShort)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, SignalType::ExitLong | SignalType::ExitShort)
    }

    /// Position side the signal concerns: the side being opened for
    /// entries, the side being closed for exits.
    pub fn position_side(&self) -> Option<OrderSide> {
        match self {
            SignalType::EnterLong | SignalType::ExitLong => Some(OrderSide::Buy),
            SignalType::EnterShort | SignalType::ExitShort => Some(OrderSide::Sell),
            SignalType::Hold => None,
        }
    }

    /// Order side used to realize the signal on the venue.
    pub fn order_side(&self) -> Option<OrderSide> {
        match self {
            SignalType::EnterLong | SignalType::ExitShort => Some(OrderSide::Buy),
            SignalType::EnterShort | SignalType::ExitLong => Some(OrderSide::Sell),
            SignalType::Hold => None,
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalType::EnterLong => "enter_long",
            SignalType::ExitLong => "exit_long",
            SignalType::EnterShort => "enter_short",
            SignalType::ExitShort => "exit_short",
            SignalType::Hold => "hold",
        };
        write!(f, "{}", s)
    }
}

/// Close fractions accepted for partial exits.
pub const ALLOWED_CLOSE_FRACTIONS: [f64; 3] = [0.5, 0.7, 1.0];

/// Tactical per-symbol instruction produced by the Trader batch call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    /// Full pair form, e.g. "BTC/USDT".
    pub symbol: String,
    pub signal_type: SignalType,
    #[serde(default)]
    pub confidence: f64,
    pub suggested_price: Option<Decimal>,
    pub suggested_amount: Option<Decimal>,
    pub leverage: Option<u32>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub reasoning: String,
    #[serde(default)]
    pub supporting_factors: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    pub close_fraction: Option<f64>,
}

impl TradingSignal {
    pub fn hold(symbol: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            signal_type: SignalType::Hold,
            confidence: 0.0,
            suggested_price: None,
            suggested_amount: None,
            leverage: None,
            stop_loss: None,
            take_profit: None,
            reasoning: reasoning.into(),
            supporting_factors: vec![],
            risk_factors: vec![],
            close_fraction: None,
        }
    }

    /// Structural validation applied to every parsed model entry. A hold
    /// only needs its reasoning; anything else must carry bounded fields
    /// and protective prices on the correct side of the entry.
    pub fn validate(&self) -> Result<(), String> {
        if self.signal_type == SignalType::Hold {
            return Ok(());
        }

        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }

        if let Some(amount) = self.suggested_amount
            && amount <= Decimal::ZERO
        {
            return Err(format!("suggested_amount {amount} must be positive"));
        }
        if let Some(price) = self.suggested_price
            && price <= Decimal::ZERO
        {
            return Err(format!("suggested_price {price} must be positive"));
        }
        if let Some(lev) = self.leverage
            && lev == 0
        {
            return Err("leverage must be at least 1".to_string());
        }

        if self.signal_type.is_entry() {
            let price = self
                .suggested_price
                .ok_or_else(|| "entry signal requires suggested_price".to_string())?;

            match self.signal_type {
                SignalType::EnterLong => {
                    if let Some(stop) = self.stop_loss
                        && stop >= price
                    {
                        return Err(format!("long stop {stop} must sit below entry {price}"));
                    }
                    if let Some(take) = self.take_profit
                        && take <= price
                    {
                        return Err(format!("long target {take} must sit above entry {price}"));
                    }
                }
                SignalType::EnterShort => {
                    if let Some(stop) = self.stop_loss
                        && stop <= price
                    {
                        return Err(format!("short stop {stop} must sit above entry {price}"));
                    }
                    if let Some(take) = self.take_profit
                        && take >= price
                    {
                        return Err(format!("short target {take} must sit below entry {price}"));
                    }
                }
                _ => {}
            }
        }

        if self.signal_type.is_exit()
            && let Some(fraction) = self.close_fraction
            && !ALLOWED_CLOSE_FRACTIONS
                .iter()
                .any(|allowed| (allowed - fraction).abs() < 1e-9)
        {
            return Err(format!(
                "close_fraction {fraction} not one of {ALLOWED_CLOSE_FRACTIONS:?}"
            ));
        }

        Ok(())
    }

    /// Effective close fraction for exits: a missing value closes the
    /// whole position.
    pub fn effective_close_fraction(&self) -> f64 {
        self.close_fraction.unwrap_or(1.0)
    }
}
