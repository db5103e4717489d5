//! Daily-loss and drawdown circuit breaker.
//!
//! Once tripped, new entries are rejected until the next UTC day or a
//! manual reset; exits and reconciliation keep running.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Daily realised+unrealised loss fraction that trips the breaker.
    pub max_daily_loss: f64,
    /// Drawdown fraction from the equity high-water mark that trips it.
    pub max_drawdown: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_daily_loss: 0.05,
            max_drawdown: 0.15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerStatus {
    pub tripped: bool,
    pub reason: Option<String>,
}

struct BreakerState {
    tripped: bool,
    reason: Option<String>,
    day: NaiveDate,
    high_water_mark: Decimal,
}

pub struct DailyCircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl DailyCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, initial_equity: Decimal) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                tripped: false,
                reason: None,
                day: Utc::now().date_naive(),
                high_water_mark: initial_equity,
            }),
        }
    }

    /// Feed the latest equity and daily PnL. Trips on a breach, clears
    /// automatically at the UTC day boundary, and keeps the high-water
    /// mark current.
    pub async fn evaluate(
        &self,
        now: DateTime<Utc>,
        equity: Decimal,
        daily_pnl: Decimal,
    ) -> BreakerStatus {
        let mut state = self.state.lock().await;

        let today = now.date_naive();
        if today != state.day {
            if state.tripped {
                info!("Circuit breaker reset at UTC day rollover");
            }
            state.day = today;
            state.tripped = false;
            state.reason = None;
        }

        if equity > state.high_water_mark {
            state.high_water_mark = equity;
        }

        if !state.tripped {
            let day_start_equity = equity - daily_pnl;
            if day_start_equity > Decimal::ZERO {
                let loss_limit = Decimal::from_f64(self.config.max_daily_loss)
                    .unwrap_or(Decimal::ZERO)
                    * day_start_equity;
                if daily_pnl < -loss_limit {
                    state.tripped = true;
                    state.reason = Some("daily_loss_breaker".to_string());
                    warn!(
                        %equity, %daily_pnl,
                        "Daily loss limit breached; blocking new entries until next UTC day"
                    );
                }
            }
        }

        if !state.tripped && state.high_water_mark > Decimal::ZERO {
            let floor = state.high_water_mark
                * (Decimal::ONE
                    - Decimal::from_f64(self.config.max_drawdown).unwrap_or(Decimal::ZERO));
            if equity < floor {
                state.tripped = true;
                state.reason = Some("drawdown_breaker".to_string());
                warn!(
                    %equity,
                    hwm = %state.high_water_mark,
                    "Drawdown limit from high-water mark breached; blocking new entries"
                );
            }
        }

        BreakerStatus {
            tripped: state.tripped,
            reason: state.reason.clone(),
        }
    }

    /// Whether the breaker currently blocks entries, honoring the UTC
    /// day rollover.
    pub async fn status(&self, now: DateTime<Utc>) -> BreakerStatus {
        let mut state = self.state.lock().await;
        let today = now.date_naive();
        if today != state.day {
            state.day = today;
            state.tripped = false;
            state.reason = None;
        }
        BreakerStatus {
            tripped: state.tripped,
            reason: state.reason.clone(),
        }
    }

    /// Operator-driven reset before the day boundary.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.tripped = false;
        state.reason = None;
        info!("Circuit breaker manually reset");
    }
}
