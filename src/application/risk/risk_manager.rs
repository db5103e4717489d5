//! Pre-trade risk checks: order-level, position-level, portfolio-level,
//! run in that order with the first failure ending the evaluation.

use crate::application::risk::circuit_breaker::DailyCircuitBreaker;
use crate::application::risk::protective_levels::{self, ProtectiveLevels};
use crate::domain::errors::RiskConfigError;
use crate::domain::market::regime::MarketRegime;
use crate::domain::trading::portfolio::Portfolio;
use crate::domain::trading::signal::{SignalType, TradingSignal};
use crate::domain::trading::symbol::base_symbol;
use crate::domain::trading::types::OrderSide;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Cap on a single position's notional as a fraction of the wallet.
    pub max_position_size: f64,
    /// Absolute notional cap per trade, in quote currency.
    pub max_single_trade: Decimal,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_leverage_major: u32,
    pub max_leverage_altcoin: u32,
    pub high_leverage_warning: u32,
    pub min_stop_distance_pct: f64,
    pub max_stop_distance_pct: f64,
    /// Required cushion between the stop and the estimated liquidation
    /// price, as a fraction of the liquidation distance.
    pub liquidation_safety_margin: f64,
    pub hedge_mode: bool,
    pub default_leverage: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size: 0.20,
            max_single_trade: Decimal::from(50_000),
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            max_leverage_major: 50,
            max_leverage_altcoin: 20,
            high_leverage_warning: 25,
            min_stop_distance_pct: 0.003,
            max_stop_distance_pct: 0.10,
            liquidation_safety_margin: 0.05,
            hedge_mode: true,
            default_leverage: 5,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        if !(0.0..=1.0).contains(&self.max_position_size) {
            return Err(RiskConfigError::Invalid(format!(
                "max_position_size {} outside (0, 1]",
                self.max_position_size
            )));
        }
        if self.min_stop_distance_pct >= self.max_stop_distance_pct {
            return Err(RiskConfigError::Invalid(
                "min_stop_distance_pct must sit below max_stop_distance_pct".to_string(),
            ));
        }
        if self.max_leverage_major == 0 || self.max_leverage_altcoin == 0 {
            return Err(RiskConfigError::Invalid(
                "leverage caps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn leverage_cap(&self, symbol: &str) -> u32 {
        match base_symbol(symbol) {
            "BTC" | "ETH" => self.max_leverage_major,
            _ => self.max_leverage_altcoin,
        }
    }
}

/// An order the executor is allowed to place.
#[derive(Debug, Clone)]
pub struct ApprovedOrder {
    pub signal: TradingSignal,
    pub order_side: OrderSide,
    pub amount: Decimal,
    pub leverage: u32,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub reduce_only: bool,
    pub reference_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct RiskCheckResult {
    pub passed: bool,
    pub reason: Option<String>,
    pub order: Option<ApprovedOrder>,
}

impl RiskCheckResult {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
            order: None,
        }
    }

    fn approved(order: ApprovedOrder) -> Self {
        Self {
            passed: true,
            reason: None,
            order: Some(order),
        }
    }
}

pub struct RiskManager {
    config: RiskConfig,
    breaker: Arc<DailyCircuitBreaker>,
}

impl RiskManager {
    pub fn new(
        config: RiskConfig,
        breaker: Arc<DailyCircuitBreaker>,
    ) -> Result<Self, RiskConfigError> {
        config.validate()?;
        Ok(Self { config, breaker })
    }

    pub fn breaker(&self) -> Arc<DailyCircuitBreaker> {
        self.breaker.clone()
    }

    /// Full evaluation of one signal against the portfolio. `daily_pnl`
    /// is today's realised plus current unrealised PnL.
    pub async fn evaluate(
        &self,
        signal: &TradingSignal,
        regime: &MarketRegime,
        portfolio: &Portfolio,
        daily_pnl: Decimal,
    ) -> RiskCheckResult {
        match signal.signal_type {
            SignalType::Hold => RiskCheckResult::rejected("hold produces no order"),
            SignalType::ExitLong | SignalType::ExitShort => self.evaluate_exit(signal, portfolio),
            SignalType::EnterLong | SignalType::EnterShort => {
                self.evaluate_entry(signal, regime, portfolio, daily_pnl).await
            }
        }
    }

    /// Exits are always permitted, breaker or not; the only requirement
    /// is an open position on the resolved side.
    fn evaluate_exit(&self, signal: &TradingSignal, portfolio: &Portfolio) -> RiskCheckResult {
        let position_side = signal
            .signal_type
            .position_side()
            .expect("exit signals carry a position side");
        let Some(position) = portfolio.position(&signal.symbol, position_side) else {
            return RiskCheckResult::rejected(format!(
                "no open {position_side} position on {}",
                signal.symbol
            ));
        };

        let fraction =
            Decimal::from_f64(signal.effective_close_fraction()).unwrap_or(Decimal::ONE);
        let amount = (position.amount * fraction).min(position.amount);
        if amount <= Decimal::ZERO {
            return RiskCheckResult::rejected("close amount resolves to zero");
        }

        RiskCheckResult::approved(ApprovedOrder {
            signal: signal.clone(),
            order_side: position_side.opposite(),
            amount,
            leverage: position.leverage,
            stop_loss: None,
            take_profit: None,
            reduce_only: true,
            reference_price: position.current_price,
        })
    }

    async fn evaluate_entry(
        &self,
        signal: &TradingSignal,
        regime: &MarketRegime,
        portfolio: &Portfolio,
        daily_pnl: Decimal,
    ) -> RiskCheckResult {
        let Some(entry_price) = signal.suggested_price else {
            return RiskCheckResult::rejected("entry without a suggested price");
        };
        let order_side = signal
            .signal_type
            .order_side()
            .expect("entry signals carry an order side");
        let position_side = signal
            .signal_type
            .position_side()
            .expect("entry signals carry a position side");

        // --- Order-level ---
        let leverage = signal.leverage.unwrap_or(self.config.default_leverage);
        let cap = self.config.leverage_cap(&signal.symbol);
        if leverage == 0 || leverage > cap {
            return RiskCheckResult::rejected(format!(
                "leverage {leverage} outside [1, {cap}] for {}",
                signal.symbol
            ));
        }
        if leverage > self.config.high_leverage_warning {
            warn!(
                symbol = %signal.symbol,
                leverage,
                "Entry above the high-leverage warning threshold"
            );
        }

        let amount = match signal.suggested_amount {
            Some(amount) => amount,
            None => self.size_entry(entry_price, regime, portfolio),
        };
        if amount <= Decimal::ZERO {
            return RiskCheckResult::rejected("sized amount resolves to zero");
        }
        let notional = amount * entry_price;

        let position_cap = portfolio.wallet_balance
            * Decimal::from_f64(self.config.max_position_size).unwrap_or(Decimal::ZERO);
        let existing_notional = portfolio
            .position(&signal.symbol, position_side)
            .map(|p| p.notional())
            .unwrap_or(Decimal::ZERO);
        if existing_notional + notional > position_cap {
            return RiskCheckResult::rejected(format!(
                "position notional {} exceeds the cap {}",
                existing_notional + notional,
                position_cap
            ));
        }

        if notional > self.config.max_single_trade {
            return RiskCheckResult::rejected(format!(
                "trade notional {notional} exceeds the single-trade cap {}",
                self.config.max_single_trade
            ));
        }

        let required_margin = notional / Decimal::from(leverage);
        if portfolio.available_balance < required_margin {
            return RiskCheckResult::rejected(format!(
                "available margin {} below required {}",
                portfolio.available_balance, required_margin
            ));
        }

        let levels: ProtectiveLevels = protective_levels::ensure_levels(
            entry_price,
            position_side,
            signal.stop_loss,
            signal.take_profit,
            self.config.stop_loss_pct,
            self.config.take_profit_pct,
            regime.position_sizing_multiplier,
        );
        let stop_distance =
            protective_levels::stop_distance_fraction(entry_price, levels.stop_loss);
        if stop_distance < self.config.min_stop_distance_pct {
            return RiskCheckResult::rejected(format!(
                "stop distance {:.4} below the minimum {:.4}",
                stop_distance, self.config.min_stop_distance_pct
            ));
        }
        if stop_distance > self.config.max_stop_distance_pct {
            return RiskCheckResult::rejected(format!(
                "stop distance {:.4} above the maximum {:.4}",
                stop_distance, self.config.max_stop_distance_pct
            ));
        }

        // --- Position-level ---
        if portfolio
            .position(&signal.symbol, position_side.opposite())
            .is_some()
            && !self.config.hedge_mode
        {
            return RiskCheckResult::rejected(format!(
                "opposite-side position open on {} and hedge mode is off",
                signal.symbol
            ));
        }

        // The stop must clear the estimated liquidation band (1/leverage
        // away from entry) with the configured cushion.
        let max_stop_before_liquidation =
            (1.0 / leverage as f64) * (1.0 - self.config.liquidation_safety_margin);
        if stop_distance > max_stop_before_liquidation {
            return RiskCheckResult::rejected(format!(
                "stop distance {:.4} too close to liquidation at {}x leverage",
                stop_distance, leverage
            ));
        }

        // --- Portfolio-level ---
        let equity = portfolio.margin_balance.max(portfolio.wallet_balance);
        let status = self.breaker.evaluate(Utc::now(), equity, daily_pnl).await;
        if status.tripped {
            return RiskCheckResult::rejected(
                status.reason.unwrap_or_else(|| "circuit_breaker".to_string()),
            );
        }

        debug!(
            symbol = %signal.symbol,
            %amount, leverage,
            "Entry passed risk checks"
        );

        RiskCheckResult::approved(ApprovedOrder {
            signal: signal.clone(),
            order_side,
            amount,
            leverage,
            stop_loss: Some(levels.stop_loss),
            take_profit: Some(levels.take_profit),
            reduce_only: false,
            reference_price: entry_price,
        })
    }

    /// Regime-weighted sizing for entries that arrive without an amount.
    /// The base allocation scales with the sizing multiplier, and is cut
    /// in half while the portfolio's cash ratio sits more than 0.2 below
    /// the regime target.
    fn size_entry(
        &self,
        entry_price: Decimal,
        regime: &MarketRegime,
        portfolio: &Portfolio,
    ) -> Decimal {
        if entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let mut multiplier = regime.position_sizing_multiplier;
        let cash_deviation = regime.cash_ratio_target - portfolio.cash_ratio();
        if cash_deviation > 0.2 {
            multiplier *= 0.5;
        }
        let target_notional = portfolio.wallet_balance
            * Decimal::from_f64(self.config.max_position_size * multiplier)
                .unwrap_or(Decimal::ZERO);
        target_notional / entry_price
    }
}
