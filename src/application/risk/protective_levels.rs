//! Stop-loss / take-profit derivation for signals that arrive without
//! them, plus the risk-to-reward floor applied to every entry.

use crate::domain::trading::types::OrderSide;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

/// Minimum reward-to-risk ratio for an entry (1 : 1.2).
pub const MIN_RISK_REWARD: f64 = 1.2;

#[derive(Debug, Clone, Copy)]
pub struct ProtectiveLevels {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

/// Fill in missing protective prices around an entry. The target scales
/// with the regime's sizing multiplier and is pushed out if needed so the
/// reward-to-risk ratio stays at or above the floor.
pub fn ensure_levels(
    entry: Decimal,
    side: OrderSide,
    provided_stop: Option<Decimal>,
    provided_take: Option<Decimal>,
    stop_loss_pct: f64,
    take_profit_pct: f64,
    sizing_multiplier: f64,
) -> ProtectiveLevels {
    let stop_fraction = Decimal::from_f64(stop_loss_pct).unwrap_or(Decimal::ZERO);
    let take_fraction =
        Decimal::from_f64(take_profit_pct * sizing_multiplier).unwrap_or(Decimal::ZERO);

    let stop_loss = provided_stop.unwrap_or(match side {
        OrderSide::Buy => entry * (Decimal::ONE - stop_fraction),
        OrderSide::Sell => entry * (Decimal::ONE + stop_fraction),
    });
    let mut take_profit = provided_take.unwrap_or(match side {
        OrderSide::Buy => entry * (Decimal::ONE + take_fraction),
        OrderSide::Sell => entry * (Decimal::ONE - take_fraction),
    });

    if let Some(ratio) = risk_reward(entry, side, stop_loss, take_profit)
        && ratio < MIN_RISK_REWARD
    {
        let risk = (entry - stop_loss).abs();
        let reward = risk * Decimal::from_f64(MIN_RISK_REWARD).unwrap_or(Decimal::ONE);
        take_profit = match side {
            OrderSide::Buy => entry + reward,
            OrderSide::Sell => entry - reward,
        };
    }

    ProtectiveLevels {
        stop_loss,
        take_profit,
    }
}

/// Reward-to-risk ratio of the given levels; None when the levels sit on
/// the wrong side or the risk is zero.
pub fn risk_reward(
    entry: Decimal,
    side: OrderSide,
    stop: Decimal,
    take: Decimal,
) -> Option<f64> {
    let (risk, reward) = match side {
        OrderSide::Buy => (entry - stop, take - entry),
        OrderSide::Sell => (stop - entry, entry - take),
    };
    if risk <= Decimal::ZERO || reward <= Decimal::ZERO {
        return None;
    }
    (reward / risk).to_f64()
}

/// Stop distance as a fraction of the entry price.
pub fn stop_distance_fraction(entry: Decimal, stop: Decimal) -> f64 {
    if entry.is_zero() {
        return 0.0;
    }
    ((entry - stop).abs() / entry).to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_long_derivation() {
        let levels = ensure_levels(dec!(50000), OrderSide::Buy, None, None, 0.02, 0.04, 1.0);
        assert_eq!(levels.stop_loss, dec!(49000));
        assert_eq!(levels.take_profit, dec!(52000));
        let ratio = risk_reward(dec!(50000), OrderSide::Buy, levels.stop_loss, levels.take_profit)
            .unwrap();
        assert!(ratio >= MIN_RISK_REWARD);
    }

    #[test]
    fn test_short_derivation() {
        let levels = ensure_levels(dec!(3000), OrderSide::Sell, None, None, 0.02, 0.04, 1.0);
        assert_eq!(levels.stop_loss, dec!(3060));
        assert_eq!(levels.take_profit, dec!(2880));
    }

    #[test]
    fn test_multiplier_widens_target() {
        let normal = ensure_levels(dec!(1000), OrderSide::Buy, None, None, 0.02, 0.04, 1.0);
        let sized_up = ensure_levels(dec!(1000), OrderSide::Buy, None, None, 0.02, 0.04, 1.5);
        assert!(sized_up.take_profit > normal.take_profit);
    }

    #[test]
    fn test_tight_target_pushed_to_floor() {
        // Provided target yields reward:risk well under the floor.
        let levels = ensure_levels(
            dec!(100),
            OrderSide::Buy,
            Some(dec!(95)),
            Some(dec!(101)),
            0.02,
            0.04,
            1.0,
        );
        let ratio =
            risk_reward(dec!(100), OrderSide::Buy, levels.stop_loss, levels.take_profit).unwrap();
        assert!(ratio >= MIN_RISK_REWARD - 1e-9);
        assert_eq!(levels.take_profit, dec!(106.0));
    }

    #[test]
    fn test_risk_reward_rejects_wrong_side() {
        assert!(risk_reward(dec!(100), OrderSide::Buy, dec!(105), dec!(110)).is_none());
        assert!(risk_reward(dec!(100), OrderSide::Sell, dec!(95), dec!(90)).is_none());
    }

    #[test]
    fn test_stop_distance_fraction() {
        assert!((stop_distance_fraction(dec!(100), dec!(98)) - 0.02).abs() < 1e-12);
        assert_eq!(stop_distance_fraction(Decimal::ZERO, dec!(98)), 0.0);
    }
}
