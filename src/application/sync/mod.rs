//! Account synchronizer: every few seconds, diff local state against
//! exchange truth, classify per-symbol changes (closed / reduced /
//! increased / new), write closed positions with exact VWAP and fees,
//! re-place missing protective orders, and rebuild the cached portfolio.

use crate::application::execution::InstrumentLocks;
use crate::application::portfolio_manager::PortfolioManager;
use crate::domain::ports::ExchangeGateway;
use crate::domain::repositories::{
    OrderRepository, PositionRepository, SnapshotRepository, TradeRepository,
};
use crate::domain::trading::portfolio::{Portfolio, PortfolioSnapshot};
use crate::domain::trading::position::{ClosedPosition, CloseReason, ExchangePosition, Position};
use crate::domain::trading::types::{
    self, Order, OrderRequest, OrderSide, OrderType, TradeFill,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub closed: usize,
    pub opened: usize,
    pub reduced: usize,
    pub increased: usize,
    pub healed: usize,
}

/// Protective prices currently armed on the venue for a position:
/// (stop, take-profit) trigger prices of reduce-only orders on the
/// closing side.
fn protective_claims(
    open_orders: &[Order],
    symbol: &str,
    close_side: OrderSide,
) -> (Option<Decimal>, Option<Decimal>) {
    let find = |order_type: OrderType| {
        open_orders
            .iter()
            .find(|o| {
                o.symbol == symbol
                    && o.side == close_side
                    && o.order_type == order_type
                    && !o.status.is_terminal()
            })
            .and_then(|o| o.stop_price)
    };
    (
        find(OrderType::StopMarket),
        find(OrderType::TakeProfitMarket),
    )
}

/// Close-reason classification from the triggering order and the
/// closing fills.
fn classify_close(fills: &[TradeFill], triggering_order: Option<&Order>) -> CloseReason {
    if fills.iter().any(|f| f.is_liquidation) {
        return CloseReason::Liquidation;
    }
    match triggering_order {
        Some(order) => match order.order_type {
            OrderType::StopMarket => CloseReason::StopLoss,
            OrderType::TakeProfitMarket => CloseReason::TakeProfit,
            // A close the system itself ordered carries its decision id
            _ if order.linked_decision_id.is_some() => CloseReason::System,
            _ => CloseReason::Manual,
        },
        None if fills.is_empty() => CloseReason::Unknown,
        None => CloseReason::Manual,
    }
}

pub struct AccountSynchronizer {
    gateway: Arc<dyn ExchangeGateway>,
    positions: Arc<dyn PositionRepository>,
    trades: Arc<dyn TradeRepository>,
    orders: Arc<dyn OrderRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    portfolio_manager: Arc<PortfolioManager>,
    locks: Arc<InstrumentLocks>,
    exchange_id: String,
    trade_cursors: Mutex<HashMap<String, i64>>,
    last_hourly_snapshot: Mutex<Option<DateTime<Utc>>>,
}

impl AccountSynchronizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        positions: Arc<dyn PositionRepository>,
        trades: Arc<dyn TradeRepository>,
        orders: Arc<dyn OrderRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        portfolio_manager: Arc<PortfolioManager>,
        locks: Arc<InstrumentLocks>,
        exchange_id: String,
    ) -> Self {
        Self {
            gateway,
            positions,
            trades,
            orders,
            snapshots,
            portfolio_manager,
            locks,
            exchange_id,
            trade_cursors: Mutex::new(HashMap::new()),
            last_hourly_snapshot: Mutex::new(None),
        }
    }

    /// One reconciliation pass over the tracked symbols.
    #[instrument(skip(self, tracked_symbols))]
    pub async fn sync_tick(&self, tracked_symbols: &[String]) -> Result<SyncReport> {
        let (balance, exchange_positions, open_orders) = tokio::join!(
            self.gateway.fetch_balance(),
            self.gateway.fetch_positions(),
            self.gateway.fetch_open_orders(None),
        );
        let balance = balance.context("balance fetch failed")?;
        let exchange_positions = exchange_positions.context("positions fetch failed")?;
        let open_orders = open_orders.context("open orders fetch failed")?;

        let fills_by_symbol = self.fetch_recent_fills(tracked_symbols).await;

        let exchange_map: HashMap<(String, OrderSide), ExchangePosition> = exchange_positions
            .into_iter()
            .map(|p| ((p.symbol.clone(), p.side), p))
            .collect();
        let local_open = self.positions.find_open(&self.exchange_id).await?;

        let mut report = SyncReport::default();
        let mut keys: HashSet<(String, OrderSide)> = exchange_map.keys().cloned().collect();
        for position in &local_open {
            keys.insert((position.symbol.clone(), position.side));
        }

        for key in keys {
            let (symbol, side) = key.clone();
            let _guard = self.locks.acquire(&symbol, side).await;

            let local = local_open
                .iter()
                .find(|p| p.symbol == symbol && p.side == side)
                .cloned();
            let remote = exchange_map.get(&key);
            let fills = fills_by_symbol.get(&symbol).cloned().unwrap_or_default();

            match (local, remote) {
                (Some(local), None) => {
                    if let Err(e) = self.handle_close(&local, &fills).await {
                        error!("Close handling failed for {symbol}/{side}: {e:#}");
                    } else {
                        report.closed += 1;
                    }
                }
                (Some(mut local), Some(remote)) => {
                    // Adopt protective claims the venue is showing; an
                    // existing claim survives so a lost venue order can
                    // be re-placed by the self-heal pass.
                    let (stop_claim, take_claim) =
                        protective_claims(&open_orders, &symbol, side.opposite());
                    if local.stop_loss.is_none() {
                        local.stop_loss = stop_claim;
                    }
                    if local.take_profit.is_none() {
                        local.take_profit = take_claim;
                    }
                    if remote.amount < local.amount {
                        let delta = local.amount - remote.amount;
                        local.apply_reduce(delta);
                        local.update_mark(remote.mark_price);
                        self.positions.upsert(&local).await?;
                        info!("Partial close on {symbol}/{side}: -{delta}");
                        report.reduced += 1;
                    } else if remote.amount > local.amount {
                        let delta = remote.amount - local.amount;
                        let opening: Vec<TradeFill> = fills
                            .iter()
                            .filter(|f| f.side == side)
                            .cloned()
                            .collect();
                        let fill_price =
                            types::vwap(&opening).unwrap_or(remote.entry_price);
                        let added_fees: Decimal = opening.iter().map(|f| f.fee).sum();
                        local.apply_increase(delta, fill_price, added_fees);
                        local.update_mark(remote.mark_price);
                        self.positions.upsert(&local).await?;
                        info!("Position increase on {symbol}/{side}: +{delta}");
                        report.increased += 1;
                    } else {
                        local.update_mark(remote.mark_price);
                        self.positions.upsert(&local).await?;
                    }
                }
                (None, Some(remote)) => {
                    let opening: Vec<TradeFill> =
                        fills.iter().filter(|f| f.side == side).cloned().collect();
                    let opened_at = opening
                        .iter()
                        .map(|f| f.timestamp)
                        .min()
                        .and_then(DateTime::from_timestamp_millis)
                        .unwrap_or_else(Utc::now);
                    let entry_fee: Decimal = opening.iter().map(|f| f.fee).sum();
                    let (stop_claim, take_claim) =
                        protective_claims(&open_orders, &symbol, side.opposite());
                    let mut position = Position {
                        exchange_id: self.exchange_id.clone(),
                        symbol: symbol.clone(),
                        side,
                        amount: remote.amount,
                        entry_price: remote.entry_price,
                        current_price: remote.mark_price,
                        unrealized_pnl: remote.unrealized_pnl,
                        unrealized_pnl_pct: Decimal::ZERO,
                        leverage: remote.leverage,
                        stop_loss: stop_claim,
                        take_profit: take_claim,
                        entry_fee,
                        opened_at,
                        closed_at: None,
                        is_open: true,
                    };
                    position.update_mark(remote.mark_price);
                    self.positions.upsert(&position).await?;
                    info!("Adopted externally opened position {symbol}/{side}");
                    report.opened += 1;
                }
                (None, None) => {}
            }
        }

        report.healed = self.heal_missing_protections(&open_orders).await;

        // Rebuild the cached portfolio from post-sync state.
        let open_positions = self.positions.find_open(&self.exchange_id).await?;
        let portfolio = Portfolio {
            wallet_balance: balance.wallet_balance,
            available_balance: balance.available_balance,
            margin_balance: balance.margin_balance,
            unrealized_pnl: balance.unrealized_pnl,
            positions: open_positions,
            open_orders,
            updated_at: Utc::now(),
        };
        self.portfolio_manager.replace(portfolio.clone()).await;

        self.archive_snapshots(&portfolio, report.closed > 0).await;

        debug!(?report, "sync tick complete");
        Ok(report)
    }

    /// Recent fills per tracked symbol since each symbol's cursor,
    /// persisted to the trade log as they arrive.
    async fn fetch_recent_fills(
        &self,
        tracked_symbols: &[String],
    ) -> HashMap<String, Vec<TradeFill>> {
        let mut result = HashMap::new();
        for symbol in tracked_symbols {
            let since = {
                let cursors = self.trade_cursors.lock().await;
                cursors.get(symbol).copied()
            };
            let since = match since {
                Some(ts) => ts + 1,
                None => match self.trades.latest_timestamp(symbol).await {
                    Ok(Some(ts)) => ts + 1,
                    _ => (Utc::now() - Duration::hours(1)).timestamp_millis(),
                },
            };

            match self.gateway.fetch_my_trades(symbol, since).await {
                Ok(fills) => {
                    if let Some(latest) = fills.iter().map(|f| f.timestamp).max() {
                        self.trade_cursors
                            .lock()
                            .await
                            .insert(symbol.clone(), latest);
                    }
                    for fill in &fills {
                        if let Err(e) = self.trades.save(fill).await {
                            error!("Failed to persist fill {}: {e:#}", fill.id);
                        }
                    }
                    result.insert(symbol.clone(), fills);
                }
                Err(e) => {
                    warn!("Trade fetch failed for {symbol}: {e}");
                }
            }
        }
        result
    }

    /// Local open, exchange absent: gather the closing fills, compute the
    /// VWAP exit and total fee, classify the reason, persist the record.
    async fn handle_close(&self, position: &Position, fills: &[TradeFill]) -> Result<()> {
        let closing: Vec<TradeFill> = fills
            .iter()
            .filter(|f| f.side == position.side.opposite())
            .cloned()
            .collect();

        let exit_price = types::vwap(&closing).unwrap_or(position.current_price);
        let fee: Decimal = closing.iter().map(|f| f.fee).sum();
        let exit_time = closing
            .iter()
            .map(|f| f.timestamp)
            .max()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        // The largest closing fill names the order that triggered the close.
        let trigger_order_id = closing
            .iter()
            .max_by(|a, b| a.amount.cmp(&b.amount))
            .map(|f| f.order_id.clone());
        let triggering_order = match &trigger_order_id {
            Some(id) => match self.orders.find_by_venue_id(id).await {
                // Some venues echo the client id in the trade feed
                Ok(None) => self.orders.find_by_client_id(id).await.unwrap_or(None),
                Ok(found) => found,
                Err(_) => None,
            },
            None => None,
        };

        let reason = classify_close(&closing, triggering_order.as_ref());
        let closed = ClosedPosition::from_position(
            position,
            exit_price,
            exit_time,
            trigger_order_id,
            fee,
            reason,
        );

        info!(
            symbol = %position.symbol,
            side = %position.side,
            %exit_price,
            reason = %reason,
            pnl = %closed.realized_pnl,
            "Position closed"
        );
        self.positions.close_position(position, &closed).await
    }

    /// Re-submit protective orders the venue lost while the local record
    /// still claims them.
    async fn heal_missing_protections(&self, open_orders: &[Order]) -> usize {
        let open_positions = match self.positions.find_open(&self.exchange_id).await {
            Ok(positions) => positions,
            Err(e) => {
                error!("Self-heal skipped; open position query failed: {e:#}");
                return 0;
            }
        };

        let mut healed = 0;
        for position in open_positions {
            let close_side = position.side.opposite();
            let has_order = |order_type: OrderType| {
                open_orders.iter().any(|o| {
                    o.symbol == position.symbol
                        && o.side == close_side
                        && o.order_type == order_type
                        && !o.status.is_terminal()
                })
            };

            if let Some(stop) = position.stop_loss
                && !has_order(OrderType::StopMarket)
            {
                warn!(
                    "Stop order missing on the venue for {}/{}; re-placing",
                    position.symbol, position.side
                );
                if self
                    .replace_protection(&position, OrderType::StopMarket, stop)
                    .await
                {
                    healed += 1;
                }
            }
            if let Some(take) = position.take_profit
                && !has_order(OrderType::TakeProfitMarket)
            {
                warn!(
                    "Take-profit order missing on the venue for {}/{}; re-placing",
                    position.symbol, position.side
                );
                if self
                    .replace_protection(&position, OrderType::TakeProfitMarket, take)
                    .await
                {
                    healed += 1;
                }
            }
        }
        healed
    }

    async fn replace_protection(
        &self,
        position: &Position,
        order_type: OrderType,
        trigger_price: Decimal,
    ) -> bool {
        let request = OrderRequest {
            symbol: position.symbol.clone(),
            side: position.side.opposite(),
            order_type,
            amount: position.amount,
            price: None,
            stop_price: Some(trigger_price),
            reduce_only: true,
            client_order_id: Uuid::new_v4().to_string(),
        };
        let now = Utc::now().timestamp_millis();
        let mut order = Order::from_request(&request, now, None);
        if let Err(e) = self.orders.save(&order).await {
            error!("Failed to pre-persist healed order: {e:#}");
            return false;
        }
        match self.gateway.create_order(&request).await {
            Ok(ack) => {
                order.id = ack.id;
                order.status = ack.status;
                order.updated_at = Utc::now().timestamp_millis();
                let _ = self.orders.save(&order).await;
                true
            }
            Err(e) => {
                warn!("Protective re-placement failed for {}: {e}", position.symbol);
                order.status = crate::domain::trading::types::OrderStatus::Rejected;
                let _ = self.orders.save(&order).await;
                false
            }
        }
    }

    /// Hourly `auto` snapshots plus event-triggered `close` snapshots.
    async fn archive_snapshots(&self, portfolio: &Portfolio, had_close: bool) {
        let now = Utc::now();

        if had_close {
            let snapshot = PortfolioSnapshot::from_portfolio(portfolio, "close", now);
            if let Err(e) = self.snapshots.save(&self.exchange_id, &snapshot).await {
                error!("Failed to archive close snapshot: {e:#}");
            }
        }

        let mut last = self.last_hourly_snapshot.lock().await;
        let due = match *last {
            Some(previous) => now - previous >= Duration::hours(1),
            None => true,
        };
        if due {
            let snapshot = PortfolioSnapshot::from_portfolio(portfolio, "auto", now);
            if let Err(e) = self.snapshots.save(&self.exchange_id, &snapshot).await {
                error!("Failed to archive hourly snapshot: {e:#}");
            } else {
                *last = Some(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fill(side: OrderSide, order_id: &str, is_liquidation: bool) -> TradeFill {
        TradeFill {
            id: "t-1".to_string(),
            order_id: order_id.to_string(),
            symbol: "ETH/USDT".to_string(),
            side,
            price: dec!(2939.5),
            amount: dec!(1),
            cost: dec!(2939.5),
            fee: dec!(0.2),
            fee_currency: Some("USDT".to_string()),
            timestamp: 1_700_000_000_000,
            is_liquidation,
            reduce_only: true,
        }
    }

    fn order_of_type(order_type: OrderType, decision: Option<i64>) -> Order {
        let request = OrderRequest {
            symbol: "ETH/USDT".to_string(),
            side: OrderSide::Sell,
            order_type,
            amount: dec!(1),
            price: None,
            stop_price: Some(dec!(2940)),
            reduce_only: true,
            client_order_id: "c-1".to_string(),
        };
        Order::from_request(&request, 0, decision)
    }

    #[test]
    fn test_stop_market_maps_to_stop_loss() {
        let order = order_of_type(OrderType::StopMarket, None);
        let reason = classify_close(&[fill(OrderSide::Sell, "o-1", false)], Some(&order));
        assert_eq!(reason, CloseReason::StopLoss);
    }

    #[test]
    fn test_take_profit_market_maps_to_take_profit() {
        let order = order_of_type(OrderType::TakeProfitMarket, None);
        let reason = classify_close(&[fill(OrderSide::Sell, "o-1", false)], Some(&order));
        assert_eq!(reason, CloseReason::TakeProfit);
    }

    #[test]
    fn test_liquidation_flag_wins() {
        let order = order_of_type(OrderType::StopMarket, None);
        let reason = classify_close(&[fill(OrderSide::Sell, "o-1", true)], Some(&order));
        assert_eq!(reason, CloseReason::Liquidation);
    }

    #[test]
    fn test_system_close_via_decision_link() {
        let order = order_of_type(OrderType::Market, Some(42));
        let reason = classify_close(&[fill(OrderSide::Sell, "o-1", false)], Some(&order));
        assert_eq!(reason, CloseReason::System);
    }

    #[test]
    fn test_unmatched_order_is_manual() {
        let reason = classify_close(&[fill(OrderSide::Sell, "o-9", false)], None);
        assert_eq!(reason, CloseReason::Manual);
    }

    #[test]
    fn test_no_fills_is_unknown() {
        assert_eq!(classify_close(&[], None), CloseReason::Unknown);
    }
}
