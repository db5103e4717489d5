use crate::domain::trading::position::Position;
use crate::domain::trading::types::{Order, OrderSide};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account-level balances as reported by the venue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountBalance {
    pub wallet_balance: Decimal,
    pub available_balance: Decimal,
    pub margin_balance: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Cached view of the account, rebuilt by the sync loop and read by the
/// strategist, trader and risk manager. Never written by readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub wallet_balance: Decimal,
    pub available_balance: Decimal,
    pub margin_balance: Decimal,
    pub unrealized_pnl: Decimal,
    pub positions: Vec<Position>,
    pub open_orders: Vec<Order>,
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn empty() -> Self {
        Self {
            wallet_balance: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            margin_balance: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            positions: Vec::new(),
            open_orders: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn position(&self, symbol: &str, side: OrderSide) -> Option<&Position> {
        self.positions
            .iter()
            .find(|p| p.is_open && p.symbol == symbol && p.side == side)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.iter().filter(|p| p.is_open).count()
    }

    pub fn total_position_notional(&self) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.is_open)
            .map(|p| p.notional())
            .sum()
    }

    /// Fraction of the wallet sitting uncommitted, in [0, 1].
    pub fn cash_ratio(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        if self.wallet_balance.is_zero() {
            return 1.0;
        }
        (self.available_balance / self.wallet_balance)
            .to_f64()
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }
}

/// Point-in-time archive of the portfolio, persisted hourly and on
/// close events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub wallet_balance: Decimal,
    pub available_balance: Decimal,
    pub margin_balance: Decimal,
    pub unrealized_pnl: Decimal,
    pub positions: Vec<Position>,
    pub timestamp: DateTime<Utc>,
    /// Truncated to the snapshot granularity; unique per exchange.
    pub snapshot_date: String,
    pub position_count: usize,
    pub archive_reason: String,
    pub is_archive: bool,
}

impl PortfolioSnapshot {
    pub fn from_portfolio(portfolio: &Portfolio, reason: &str, now: DateTime<Utc>) -> Self {
        let open_positions: Vec<Position> = portfolio
            .positions
            .iter()
            .filter(|p| p.is_open)
            .cloned()
            .collect();
        Self {
            wallet_balance: portfolio.wallet_balance,
            available_balance: portfolio.available_balance,
            margin_balance: portfolio.margin_balance,
            unrealized_pnl: portfolio.unrealized_pnl,
            position_count: open_positions.len(),
            positions: open_positions,
            timestamp: now,
            snapshot_date: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
            archive_reason: reason.to_string(),
            is_archive: true,
        }
    }
}

/// Per-venue baseline written once at startup; the PnL high-water mark
/// and drawdown are measured against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    pub exchange_id: String,
    pub initial_capital: Decimal,
    pub capital_currency: String,
    pub set_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn portfolio_with_position() -> Portfolio {
        let mut portfolio = Portfolio::empty();
        portfolio.wallet_balance = dec!(10000);
        portfolio.available_balance = dec!(6000);
        portfolio.positions.push(Position {
            exchange_id: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            side: OrderSide::Buy,
            amount: dec!(0.1),
            entry_price: dec!(50000),
            current_price: dec!(51000),
            unrealized_pnl: dec!(100),
            unrealized_pnl_pct: dec!(2),
            leverage: 10,
            stop_loss: None,
            take_profit: None,
            entry_fee: Decimal::ZERO,
            opened_at: Utc::now(),
            closed_at: None,
            is_open: true,
        });
        portfolio
    }

    #[test]
    fn test_position_lookup_by_side() {
        let portfolio = portfolio_with_position();
        assert!(portfolio.position("BTC/USDT", OrderSide::Buy).is_some());
        assert!(portfolio.position("BTC/USDT", OrderSide::Sell).is_none());
        assert!(portfolio.position("ETH/USDT", OrderSide::Buy).is_none());
    }

    #[test]
    fn test_cash_ratio() {
        let portfolio = portfolio_with_position();
        assert!((portfolio.cash_ratio() - 0.6).abs() < 1e-9);
        assert!((Portfolio::empty().cash_ratio() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_only_keeps_open_positions() {
        let mut portfolio = portfolio_with_position();
        let mut closed = portfolio.positions[0].clone();
        closed.is_open = false;
        portfolio.positions.push(closed);

        let snapshot = PortfolioSnapshot::from_portfolio(&portfolio, "auto", Utc::now());
        assert_eq!(snapshot.position_count, 1);
        assert_eq!(snapshot.archive_reason, "auto");
    }
}
