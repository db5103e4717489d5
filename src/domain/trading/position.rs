use crate::domain::trading::types::OrderSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::error;

/// Why a position left the book, derived by the reconciler from the
/// triggering order or trade event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Manual,
    StopLoss,
    TakeProfit,
    Liquidation,
    System,
    Unknown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Manual => "manual",
            CloseReason::StopLoss => "stop_loss",
            CloseReason::TakeProfit => "take_profit",
            CloseReason::Liquidation => "liquidation",
            CloseReason::System => "system",
            CloseReason::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CloseReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(CloseReason::Manual),
            "stop_loss" => Ok(CloseReason::StopLoss),
            "take_profit" => Ok(CloseReason::TakeProfit),
            "liquidation" => Ok(CloseReason::Liquidation),
            "system" => Ok(CloseReason::System),
            "unknown" => Ok(CloseReason::Unknown),
            _ => anyhow::bail!("Unknown close reason: {}", s),
        }
    }
}

/// An open (or just-closed) position. In hedge mode a long and a short on
/// the same symbol coexist as two independent rows; at most one open row
/// exists per (exchange, symbol, side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub exchange_id: String,
    pub symbol: String,
    /// Buy = long, Sell = short.
    pub side: OrderSide,
    pub amount: Decimal,
    /// VWAP of the entry fills.
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
    pub leverage: u32,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub entry_fee: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_open: bool,
}

impl Position {
    pub fn notional(&self) -> Decimal {
        self.amount * self.current_price
    }

    /// Signed PnL direction: +1 for long, -1 for short.
    fn direction(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => -Decimal::ONE,
        }
    }

    /// Refresh the mark price and derived unrealized PnL.
    pub fn update_mark(&mut self, price: Decimal) {
        self.current_price = price;
        self.unrealized_pnl = self.direction() * self.amount * (price - self.entry_price);
        let basis = self.amount * self.entry_price;
        self.unrealized_pnl_pct = if basis.is_zero() {
            Decimal::ZERO
        } else {
            self.unrealized_pnl / basis * Decimal::ONE_HUNDRED
        };
    }

    /// Fold an incremental fill into the position, moving the entry
    /// price to the VWAP of prior basis plus the new fill.
    pub fn apply_increase(&mut self, fill_amount: Decimal, fill_price: Decimal, fee: Decimal) {
        let new_amount = self.amount + fill_amount;
        if new_amount.is_zero() {
            return;
        }
        self.entry_price =
            (self.amount * self.entry_price + fill_amount * fill_price) / new_amount;
        self.amount = new_amount;
        self.entry_fee += fee;
    }

    /// A partial close keeps the remaining basis at the same VWAP.
    pub fn apply_reduce(&mut self, fill_amount: Decimal) {
        self.amount = (self.amount - fill_amount).max(Decimal::ZERO);
    }
}

/// Immutable record written once when a position leaves the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub exchange_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub entry_fee: Decimal,
    pub leverage: u32,
    pub opened_at: DateTime<Utc>,
    /// VWAP over the closing fills.
    pub exit_price: Decimal,
    pub exit_time: DateTime<Utc>,
    pub exit_order_id: Option<String>,
    /// Total fee across the closing fills.
    pub fee: Decimal,
    pub realized_pnl: Decimal,
    pub realized_pnl_pct: Decimal,
    pub holding_duration_secs: i64,
    pub close_reason: CloseReason,
}

impl ClosedPosition {
    /// Build the closed record from the position and its closing fills.
    ///
    /// The holding duration is clamped at zero: venues have returned
    /// out-of-order timestamps historically, so a negative duration is
    /// logged at ERROR and written as its absolute value; the database
    /// CHECK constraint refuses anything below zero.
    pub fn from_position(
        position: &Position,
        exit_price: Decimal,
        exit_time: DateTime<Utc>,
        exit_order_id: Option<String>,
        fee: Decimal,
        close_reason: CloseReason,
    ) -> Self {
        let direction = match position.side {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => -Decimal::ONE,
        };
        let realized_pnl = direction * position.amount * (exit_price - position.entry_price) - fee;
        let basis = position.amount * position.entry_price;
        let realized_pnl_pct = if basis.is_zero() {
            Decimal::ZERO
        } else {
            realized_pnl / basis * Decimal::ONE_HUNDRED
        };

        let raw_duration = (exit_time - position.opened_at).num_seconds();
        if raw_duration < 0 {
            error!(
                symbol = %position.symbol,
                opened_at = %position.opened_at,
                exit_time = %exit_time,
                "Exchange returned out-of-order close timestamps; writing absolute holding duration"
            );
        }
        let holding_duration_secs = raw_duration.abs();

        Self {
            exchange_id: position.exchange_id.clone(),
            symbol: position.symbol.clone(),
            side: position.side,
            amount: position.amount,
            entry_price: position.entry_price,
            entry_fee: position.entry_fee,
            leverage: position.leverage,
            opened_at: position.opened_at,
            exit_price,
            exit_time,
            exit_order_id,
            fee,
            realized_pnl,
            realized_pnl_pct,
            holding_duration_secs,
            close_reason,
        }
    }
}

/// Venue-truth position row, as fetched from the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangePosition {
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub leverage: u32,
    pub liquidation_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn long_position() -> Position {
        Position {
            exchange_id: "binance".to_string(),
            symbol: "ETH/USDT".to_string(),
            side: OrderSide::Buy,
            amount: dec!(1.0),
            entry_price: dec!(3000),
            current_price: dec!(3000),
            unrealized_pnl: Decimal::ZERO,
            unrealized_pnl_pct: Decimal::ZERO,
            leverage: 10,
            stop_loss: Some(dec!(2940)),
            take_profit: Some(dec!(3120)),
            entry_fee: dec!(0.5),
            opened_at: Utc::now() - Duration::hours(2),
            closed_at: None,
            is_open: true,
        }
    }

    #[test]
    fn test_stop_loss_close_math() {
        // A long from 3000 stopped at VWAP 2939.5 with a 0.2 fee loses
        // exactly 60.7.
        let position = long_position();
        let exit_time = Utc::now();
        let closed = ClosedPosition::from_position(
            &position,
            dec!(2939.5),
            exit_time,
            Some("stop-1".to_string()),
            dec!(0.2),
            CloseReason::StopLoss,
        );
        assert_eq!(closed.realized_pnl, dec!(-60.7));
        assert_eq!(closed.close_reason, CloseReason::StopLoss);
        assert!(closed.holding_duration_secs > 0);
    }

    #[test]
    fn test_short_close_math() {
        let mut position = long_position();
        position.side = OrderSide::Sell;
        let closed = ClosedPosition::from_position(
            &position,
            dec!(2900),
            Utc::now(),
            None,
            dec!(1),
            CloseReason::Manual,
        );
        // Short gains when price drops: 1.0 * (3000 - 2900) - 1 = 99
        assert_eq!(closed.realized_pnl, dec!(99));
    }

    #[test]
    fn test_negative_duration_written_as_absolute() {
        let mut position = long_position();
        position.opened_at = Utc::now();
        let exit_time = position.opened_at - Duration::seconds(90);
        let closed = ClosedPosition::from_position(
            &position,
            dec!(3000),
            exit_time,
            None,
            Decimal::ZERO,
            CloseReason::Unknown,
        );
        assert_eq!(closed.holding_duration_secs, 90);
    }

    #[test]
    fn test_vwap_increase() {
        let mut position = long_position();
        position.apply_increase(dec!(1.0), dec!(3100), dec!(0.5));
        assert_eq!(position.amount, dec!(2.0));
        assert_eq!(position.entry_price, dec!(3050));
        assert_eq!(position.entry_fee, dec!(1.0));
    }

    #[test]
    fn test_reduce_keeps_entry_price() {
        let mut position = long_position();
        position.apply_reduce(dec!(0.4));
        assert_eq!(position.amount, dec!(0.6));
        assert_eq!(position.entry_price, dec!(3000));
    }

    #[test]
    fn test_update_mark() {
        let mut position = long_position();
        position.update_mark(dec!(3150));
        assert_eq!(position.unrealized_pnl, dec!(150));
        assert_eq!(position.unrealized_pnl_pct, dec!(5));
    }
}
