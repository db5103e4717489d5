//! Order executor: turns approved signals into venue orders.
//!
//! Idempotency discipline: every order row is persisted as `pending`
//! BEFORE the venue call, keyed by a fresh UUID client order id; replays
//! hit the unique index locally and the venue's own dedup remotely.
//! Per-(symbol, side) instrument locks serialise submissions against
//! each other and against the reconciler.

use crate::application::risk::ApprovedOrder;
use crate::domain::decision::DecisionOutcome;
use crate::domain::ports::ExchangeGateway;
use crate::domain::repositories::{DecisionRepository, OrderRepository};
use crate::domain::trading::types::{Order, OrderRequest, OrderSide, OrderStatus, OrderType};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Registry of per-(symbol, position-side) mutexes shared by the
/// executor and the account synchronizer.
pub struct InstrumentLocks {
    locks: Mutex<HashMap<(String, OrderSide), Arc<Mutex<()>>>>,
}

impl InstrumentLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(
        &self,
        symbol: &str,
        side: OrderSide,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry((symbol.to_string(), side))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

impl Default for InstrumentLocks {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ExecutionReport {
    pub primary: Order,
    pub companions: Vec<Order>,
    pub errors: Vec<String>,
    pub success: bool,
}

pub struct OrderExecutor {
    gateway: Arc<dyn ExchangeGateway>,
    orders: Arc<dyn OrderRepository>,
    decisions: Arc<dyn DecisionRepository>,
    locks: Arc<InstrumentLocks>,
    /// Last leverage set per symbol; skips redundant venue calls.
    leverage_cache: Mutex<HashMap<String, u32>>,
}

impl OrderExecutor {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        orders: Arc<dyn OrderRepository>,
        decisions: Arc<dyn DecisionRepository>,
        locks: Arc<InstrumentLocks>,
    ) -> Self {
        Self {
            gateway,
            orders,
            decisions,
            locks,
            leverage_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Submit one approved order, plus protective companions for fills
    /// on entries. The signal handed over is consumed as-is; nothing is
    /// re-inferred here.
    #[instrument(skip(self, approved), fields(symbol = %approved.signal.symbol, side = ?approved.order_side))]
    pub async fn execute(
        &self,
        approved: &ApprovedOrder,
        decision_id: Option<i64>,
    ) -> Result<ExecutionReport> {
        let position_side = if approved.reduce_only {
            approved.order_side.opposite()
        } else {
            approved.order_side
        };
        let _guard = self
            .locks
            .acquire(&approved.signal.symbol, position_side)
            .await;

        if !approved.reduce_only {
            self.ensure_leverage(&approved.signal.symbol, approved.leverage)
                .await;
        }

        let request = OrderRequest {
            symbol: approved.signal.symbol.clone(),
            side: approved.order_side,
            order_type: OrderType::Market,
            amount: approved.amount,
            price: None,
            stop_price: None,
            reduce_only: approved.reduce_only,
            client_order_id: Uuid::new_v4().to_string(),
        };

        let now = Utc::now().timestamp_millis();
        let mut order = Order::from_request(&request, now, decision_id);

        // Pre-persist before touching the venue. If this fails we abort:
        // an order the book cannot account for must never reach the wire.
        self.orders
            .save(&order)
            .await
            .context("failed to pre-persist order; aborting submission")?;

        let mut report = ExecutionReport {
            primary: order.clone(),
            companions: vec![],
            errors: vec![],
            success: false,
        };

        match self.gateway.create_order(&request).await {
            Ok(ack) => {
                order.id = ack.id.clone();
                order.status = ack.status;
                order.filled = ack.filled;
                order.average = ack.average;
                order.fee = ack.fee;
                order.updated_at = Utc::now().timestamp_millis();
                if let Err(e) = self.orders.save(&order).await {
                    error!("Failed to record venue ack for {}: {e:#}", order.client_order_id);
                }
                info!(
                    client_order_id = %order.client_order_id,
                    status = %order.status,
                    "Primary order submitted"
                );
            }
            Err(e) => {
                warn!("Venue rejected {}: {e}", order.client_order_id);
                order.status = OrderStatus::Rejected;
                order.updated_at = Utc::now().timestamp_millis();
                if let Err(save_err) = self.orders.save(&order).await {
                    error!("Failed to record rejection: {save_err:#}");
                }
                if let Some(id) = decision_id {
                    let _ = self
                        .decisions
                        .update_outcome(id, DecisionOutcome::ExecutionFailed, Some(&e.to_string()))
                        .await;
                }
                report.primary = order;
                report.errors.push(e.to_string());
                return Ok(report);
            }
        }

        report.primary = order.clone();
        report.success = true;

        // Protective companions only for filled entries.
        if !approved.reduce_only && order.status == OrderStatus::Filled {
            if let Some(stop) = approved.stop_loss {
                match self
                    .place_companion(approved, OrderType::StopMarket, stop, decision_id)
                    .await
                {
                    Ok(companion) => report.companions.push(companion),
                    Err(e) => {
                        warn!(
                            "Stop placement failed for {}; reconciler will self-heal: {e:#}",
                            approved.signal.symbol
                        );
                        report.errors.push(format!("stop placement failed: {e}"));
                    }
                }
            }
            if let Some(take) = approved.take_profit {
                match self
                    .place_companion(approved, OrderType::TakeProfitMarket, take, decision_id)
                    .await
                {
                    Ok(companion) => report.companions.push(companion),
                    Err(e) => {
                        warn!(
                            "Take-profit placement failed for {}; reconciler will self-heal: {e:#}",
                            approved.signal.symbol
                        );
                        report
                            .errors
                            .push(format!("take-profit placement failed: {e}"));
                    }
                }
            }
        }

        Ok(report)
    }

    async fn place_companion(
        &self,
        approved: &ApprovedOrder,
        order_type: OrderType,
        trigger_price: rust_decimal::Decimal,
        decision_id: Option<i64>,
    ) -> Result<Order> {
        let request = OrderRequest {
            symbol: approved.signal.symbol.clone(),
            side: approved.order_side.opposite(),
            order_type,
            amount: approved.amount,
            price: None,
            stop_price: Some(trigger_price),
            reduce_only: true,
            client_order_id: Uuid::new_v4().to_string(),
        };

        let now = Utc::now().timestamp_millis();
        let mut order = Order::from_request(&request, now, decision_id);
        self.orders
            .save(&order)
            .await
            .context("failed to pre-persist companion order")?;

        let ack = self
            .gateway
            .create_order(&request)
            .await
            .with_context(|| format!("{order_type} submission failed"))?;

        order.id = ack.id;
        order.status = ack.status;
        order.updated_at = Utc::now().timestamp_millis();
        self.orders.save(&order).await?;
        info!(
            client_order_id = %order.client_order_id,
            order_type = %order_type,
            trigger = %trigger_price,
            "Companion order placed"
        );
        Ok(order)
    }

    async fn ensure_leverage(&self, symbol: &str, leverage: u32) {
        {
            let cache = self.leverage_cache.lock().await;
            if cache.get(symbol) == Some(&leverage) {
                return;
            }
        }
        match self.gateway.set_leverage(symbol, leverage).await {
            Ok(()) => {
                self.leverage_cache
                    .lock()
                    .await
                    .insert(symbol.to_string(), leverage);
            }
            Err(e) => warn!("Failed to set {leverage}x leverage on {symbol}: {e}"),
        }
    }

    /// Startup pass: locally pending orders are matched against the
    /// venue's open orders; confirmed ones advance, unknown ones are
    /// assumed to have never reached the wire and are rejected.
    pub async fn reconcile_pending_on_startup(&self) -> Result<()> {
        let local_pending = self.orders.find_by_status(OrderStatus::Pending).await?;
        if local_pending.is_empty() {
            info!("No pending orders to reconcile at startup");
            return Ok(());
        }

        let open_orders = self.gateway.fetch_open_orders(None).await?;
        for mut order in local_pending {
            let on_venue = open_orders
                .iter()
                .any(|o| o.client_order_id == order.client_order_id);
            let now = Utc::now().timestamp_millis();
            if on_venue {
                info!(
                    "Pending order {} found on the venue; marking open",
                    order.client_order_id
                );
                order.transition(OrderStatus::Open, now);
            } else {
                warn!(
                    "Pending order {} absent from the venue; marking rejected",
                    order.client_order_id
                );
                order.transition(OrderStatus::Rejected, now);
            }
            self.orders.save(&order).await?;
        }
        info!("Startup order reconciliation complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_instrument_locks_serialise_same_key() {
        let locks = Arc::new(InstrumentLocks::new());
        let guard = locks.acquire("BTC/USDT", OrderSide::Buy).await;

        // Same key cannot be acquired while held
        let locks_clone = locks.clone();
        let contended = tokio::time::timeout(std::time::Duration::from_millis(50), async move {
            locks_clone.acquire("BTC/USDT", OrderSide::Buy).await
        })
        .await;
        assert!(contended.is_err());

        // Different side proceeds immediately
        let _other = locks.acquire("BTC/USDT", OrderSide::Sell).await;
        drop(guard);
        let _reacquired = locks.acquire("BTC/USDT", OrderSide::Buy).await;
    }
}
