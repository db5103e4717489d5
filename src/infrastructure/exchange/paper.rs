//! Paper-trading gateway.
//!
//! Used when live trading is disabled: market-data reads pass through to
//! the inner gateway while account state and order flow are simulated
//! locally. Market orders fill at the current mark price; stop-market and
//! take-profit-market orders rest until a mark-price move triggers them.

use crate::domain::errors::GatewayError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::types::{Candle, Ticker};
use crate::domain::ports::{ExchangeGateway, GatewayHealth};
use crate::domain::trading::portfolio::AccountBalance;
use crate::domain::trading::position::ExchangePosition;
use crate::domain::trading::types::{
    Order, OrderRequest, OrderSide, OrderStatus, OrderType, TradeFill,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

/// Taker fee fraction applied to simulated fills.
const PAPER_FEE_RATE: Decimal = dec!(0.0004);

struct PaperState {
    wallet_balance: Decimal,
    positions: HashMap<(String, OrderSide), ExchangePosition>,
    open_orders: Vec<Order>,
    fills: Vec<TradeFill>,
    leverage: HashMap<String, u32>,
    mark_prices: HashMap<String, Decimal>,
    used_client_ids: std::collections::HashSet<String>,
}

pub struct PaperGateway {
    /// Inner gateway serving market-data reads; may be a live venue.
    reads: Option<Arc<dyn ExchangeGateway>>,
    state: RwLock<PaperState>,
    sequence: AtomicU64,
}

impl PaperGateway {
    pub fn new(reads: Option<Arc<dyn ExchangeGateway>>, starting_balance: Decimal) -> Self {
        Self {
            reads,
            state: RwLock::new(PaperState {
                wallet_balance: starting_balance,
                positions: HashMap::new(),
                open_orders: Vec::new(),
                fills: Vec::new(),
                leverage: HashMap::new(),
                mark_prices: HashMap::new(),
                used_client_ids: std::collections::HashSet::new(),
            }),
            sequence: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> String {
        format!("paper-{}", self.sequence.fetch_add(1, Ordering::Relaxed))
    }

    /// Push a mark price and trigger any resting protective orders whose
    /// condition it satisfies. Tests drive the simulation through this.
    pub async fn set_mark_price(&self, symbol: &str, price: Decimal) {
        let triggered: Vec<Order> = {
            let mut state = self.state.write().await;
            state.mark_prices.insert(symbol.to_string(), price);
            for position in state.positions.values_mut() {
                if position.symbol == symbol {
                    position.mark_price = price;
                    let direction = match position.side {
                        OrderSide::Buy => Decimal::ONE,
                        OrderSide::Sell => -Decimal::ONE,
                    };
                    position.unrealized_pnl =
                        direction * position.amount * (price - position.entry_price);
                }
            }

            let mut fired = Vec::new();
            state.open_orders.retain(|order| {
                let hit = order.symbol == symbol
                    && match (order.order_type, order.stop_price) {
                        (OrderType::StopMarket, Some(stop)) => match order.side {
                            // Sell stop protects a long: fires when price drops to it
                            OrderSide::Sell => price <= stop,
                            OrderSide::Buy => price >= stop,
                        },
                        (OrderType::TakeProfitMarket, Some(target)) => match order.side {
                            OrderSide::Sell => price >= target,
                            OrderSide::Buy => price <= target,
                        },
                        _ => false,
                    };
                if hit {
                    fired.push(order.clone());
                }
                !hit
            });
            fired
        };

        for order in triggered {
            let fill_price = order.stop_price.unwrap_or(price);
            info!(
                symbol = %order.symbol,
                order_type = %order.order_type,
                "Paper protective order triggered"
            );
            self.fill(&order, fill_price, false).await;
        }
    }

    async fn current_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        if let Some(price) = self.state.read().await.mark_prices.get(symbol) {
            return Ok(*price);
        }
        match &self.reads {
            Some(inner) => inner.fetch_ticker(symbol).await.map(|t| t.last),
            None => Err(GatewayError::Exchange {
                code: 0,
                message: format!("paper gateway has no mark price for {symbol}"),
            }),
        }
    }

    /// Apply a fill to the simulated book.
    async fn fill(&self, order: &Order, price: Decimal, is_liquidation: bool) -> TradeFill {
        let mut state = self.state.write().await;
        let position_side = if order.reduce_only {
            order.side.opposite()
        } else {
            order.side
        };
        let key = (order.symbol.clone(), position_side);
        let fee = order.amount * price * PAPER_FEE_RATE;

        if order.reduce_only {
            if let Some(position) = state.positions.get_mut(&key) {
                let closed_amount = order.amount.min(position.amount);
                let direction = match position.side {
                    OrderSide::Buy => Decimal::ONE,
                    OrderSide::Sell => -Decimal::ONE,
                };
                let realized = direction * closed_amount * (price - position.entry_price);
                state.wallet_balance += realized - fee;
                let position = state.positions.get_mut(&key).expect("checked above");
                position.amount -= closed_amount;
                if position.amount.is_zero() {
                    state.positions.remove(&key);
                }
            }
        } else {
            state.wallet_balance -= fee;
            let leverage = state.leverage.get(&order.symbol).copied().unwrap_or(1);
            let entry = state.positions.entry(key).or_insert(ExchangePosition {
                symbol: order.symbol.clone(),
                side: position_side,
                amount: Decimal::ZERO,
                entry_price: Decimal::ZERO,
                mark_price: price,
                unrealized_pnl: Decimal::ZERO,
                leverage,
                liquidation_price: None,
            });
            let new_amount = entry.amount + order.amount;
            entry.entry_price =
                (entry.amount * entry.entry_price + order.amount * price) / new_amount;
            entry.amount = new_amount;
            entry.mark_price = price;
        }

        let fill = TradeFill {
            id: self.next_id(),
            order_id: order.id.clone().unwrap_or_default(),
            symbol: order.symbol.clone(),
            side: order.side,
            price,
            amount: order.amount,
            cost: order.amount * price,
            fee,
            fee_currency: Some("USDT".to_string()),
            timestamp: Utc::now().timestamp_millis(),
            is_liquidation,
            reduce_only: order.reduce_only,
        };
        state.fills.push(fill.clone());
        fill
    }

    /// Force-liquidate a simulated position; the resulting fill carries
    /// the liquidation flag the reconciler keys on.
    pub async fn force_liquidate(&self, symbol: &str, side: OrderSide, price: Decimal) {
        let amount = {
            let state = self.state.read().await;
            state
                .positions
                .get(&(symbol.to_string(), side))
                .map(|p| p.amount)
        };
        if let Some(amount) = amount {
            let order = Order {
                id: Some(self.next_id()),
                client_order_id: self.next_id(),
                symbol: symbol.to_string(),
                side: side.opposite(),
                order_type: OrderType::Market,
                status: OrderStatus::Filled,
                price: None,
                amount,
                filled: amount,
                average: Some(price),
                fee: None,
                fee_currency: None,
                stop_price: None,
                reduce_only: true,
                created_at: Utc::now().timestamp_millis(),
                updated_at: Utc::now().timestamp_millis(),
                linked_decision_id: None,
                raw_payload: None,
            };
            self.fill(&order, price, true).await;
        }
    }
}

#[async_trait]
impl ExchangeGateway for PaperGateway {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, GatewayError> {
        if let Some(inner) = &self.reads {
            return inner.fetch_ticker(symbol).await;
        }
        let price = self.current_price(symbol).await?;
        Ok(Ticker {
            symbol: symbol.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            last: price,
            bid: None,
            ask: None,
            high_24h: None,
            low_24h: None,
            base_volume: Decimal::ZERO,
            quote_volume: Decimal::ZERO,
            percent_change_24h: Decimal::ZERO,
        })
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        match &self.reads {
            Some(inner) => inner.fetch_ohlcv(symbol, timeframe, limit).await,
            None => Ok(vec![]),
        }
    }

    async fn fetch_balance(&self) -> Result<AccountBalance, GatewayError> {
        let state = self.state.read().await;
        let unrealized: Decimal = state.positions.values().map(|p| p.unrealized_pnl).sum();
        let margin_used: Decimal = state
            .positions
            .values()
            .map(|p| p.amount * p.mark_price / Decimal::from(p.leverage.max(1)))
            .sum();
        Ok(AccountBalance {
            wallet_balance: state.wallet_balance,
            available_balance: (state.wallet_balance - margin_used).max(Decimal::ZERO),
            margin_balance: state.wallet_balance + unrealized,
            unrealized_pnl: unrealized,
        })
    }

    async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError> {
        Ok(self.state.read().await.positions.values().cloned().collect())
    }

    async fn fetch_open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<Order>, GatewayError> {
        let state = self.state.read().await;
        Ok(state
            .open_orders
            .iter()
            .filter(|o| symbol.is_none_or(|s| o.symbol == s))
            .cloned()
            .collect())
    }

    async fn fetch_my_trades(
        &self,
        symbol: &str,
        since_ms: i64,
    ) -> Result<Vec<TradeFill>, GatewayError> {
        let state = self.state.read().await;
        Ok(state
            .fills
            .iter()
            .filter(|f| f.symbol == symbol && f.timestamp >= since_ms)
            .cloned()
            .collect())
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<Order, GatewayError> {
        // Venue-style idempotency on the client order id.
        {
            let mut state = self.state.write().await;
            if let Some(existing) = state
                .open_orders
                .iter()
                .find(|o| o.client_order_id == request.client_order_id)
            {
                return Ok(existing.clone());
            }
            if !state.used_client_ids.insert(request.client_order_id.clone()) {
                return Err(GatewayError::Exchange {
                    code: -4015,
                    message: "Client order id is duplicated".to_string(),
                });
            }
        }

        let now = Utc::now().timestamp_millis();
        let mut order = Order::from_request(request, now, None);
        order.id = Some(self.next_id());

        match request.order_type {
            OrderType::Market => {
                let price = self.current_price(&request.symbol).await?;
                if request.reduce_only {
                    let position_side = request.side.opposite();
                    let held = self
                        .state
                        .read()
                        .await
                        .positions
                        .get(&(request.symbol.clone(), position_side))
                        .map(|p| p.amount)
                        .unwrap_or(Decimal::ZERO);
                    if held < request.amount {
                        return Err(GatewayError::Exchange {
                            code: -2022,
                            message: "ReduceOnly Order is rejected".to_string(),
                        });
                    }
                }
                let fill = self.fill(&order, price, false).await;
                order.record_fill(request.amount, Some(fill.price), now);
                order.fee = Some(fill.fee);
                Ok(order)
            }
            OrderType::Limit | OrderType::StopMarket | OrderType::TakeProfitMarket => {
                order.status = OrderStatus::Open;
                self.state.write().await.open_orders.push(order.clone());
                Ok(order)
            }
        }
    }

    async fn cancel_order(&self, order_id: &str, symbol: &str) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        let before = state.open_orders.len();
        state
            .open_orders
            .retain(|o| !(o.id.as_deref() == Some(order_id) && o.symbol == symbol));
        if state.open_orders.len() == before {
            return Err(GatewayError::OrderNotFound {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
            });
        }
        Ok(())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), GatewayError> {
        self.state
            .write()
            .await
            .leverage
            .insert(symbol.to_string(), leverage);
        Ok(())
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Option<Decimal>, GatewayError> {
        match &self.reads {
            Some(inner) => inner.fetch_funding_rate(symbol).await,
            None => Ok(None),
        }
    }

    async fn fetch_long_short_ratio(
        &self,
        symbol: &str,
    ) -> Result<Option<Decimal>, GatewayError> {
        match &self.reads {
            Some(inner) => inner.fetch_long_short_ratio(symbol).await,
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<GatewayHealth, GatewayError> {
        Ok(GatewayHealth {
            reachable: true,
            latency_ms: 0,
            total_requests: self.state.read().await.fills.len() as u64,
            total_waits: 0,
            average_wait_ms: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market_request(side: OrderSide, amount: Decimal, reduce_only: bool) -> OrderRequest {
        OrderRequest {
            symbol: "BTC/USDT".to_string(),
            side,
            order_type: OrderType::Market,
            amount,
            price: None,
            stop_price: None,
            reduce_only,
            client_order_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    #[tokio::test]
    async fn test_market_order_opens_position() {
        let gateway = PaperGateway::new(None, dec!(10000));
        gateway.set_mark_price("BTC/USDT", dec!(50000)).await;

        let order = gateway
            .create_order(&market_request(OrderSide::Buy, dec!(0.1), false))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);

        let positions = gateway.fetch_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].amount, dec!(0.1));
        assert_eq!(positions[0].entry_price, dec!(50000));
    }

    #[tokio::test]
    async fn test_hedge_mode_sides_coexist() {
        let gateway = PaperGateway::new(None, dec!(10000));
        gateway.set_mark_price("BTC/USDT", dec!(50000)).await;

        gateway
            .create_order(&market_request(OrderSide::Buy, dec!(0.1), false))
            .await
            .unwrap();
        gateway
            .create_order(&market_request(OrderSide::Sell, dec!(0.05), false))
            .await
            .unwrap();

        let positions = gateway.fetch_positions().await.unwrap();
        assert_eq!(positions.len(), 2);
    }

    #[tokio::test]
    async fn test_reduce_only_close_realizes_pnl() {
        let gateway = PaperGateway::new(None, dec!(10000));
        gateway.set_mark_price("ETH/USDT", dec!(3000)).await;

        let mut open = market_request(OrderSide::Buy, dec!(1), false);
        open.symbol = "ETH/USDT".to_string();
        gateway.create_order(&open).await.unwrap();

        gateway.set_mark_price("ETH/USDT", dec!(3100)).await;
        let mut close = market_request(OrderSide::Sell, dec!(1), true);
        close.symbol = "ETH/USDT".to_string();
        gateway.create_order(&close).await.unwrap();

        assert!(gateway.fetch_positions().await.unwrap().is_empty());
        let balance = gateway.fetch_balance().await.unwrap();
        // +100 realized minus entry and exit fees
        assert!(balance.wallet_balance > dec!(10095));
        assert!(balance.wallet_balance < dec!(10100));
    }

    #[tokio::test]
    async fn test_stop_market_triggers_on_drop() {
        let gateway = PaperGateway::new(None, dec!(10000));
        gateway.set_mark_price("ETH/USDT", dec!(3000)).await;

        let mut open = market_request(OrderSide::Buy, dec!(1), false);
        open.symbol = "ETH/USDT".to_string();
        gateway.create_order(&open).await.unwrap();

        let stop = OrderRequest {
            symbol: "ETH/USDT".to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::StopMarket,
            amount: dec!(1),
            price: None,
            stop_price: Some(dec!(2940)),
            reduce_only: true,
            client_order_id: uuid::Uuid::new_v4().to_string(),
        };
        gateway.create_order(&stop).await.unwrap();
        assert_eq!(gateway.fetch_open_orders(None).await.unwrap().len(), 1);

        // Price stays above the stop: nothing happens
        gateway.set_mark_price("ETH/USDT", dec!(2960)).await;
        assert_eq!(gateway.fetch_positions().await.unwrap().len(), 1);

        // Price crosses the stop: position closes, order leaves the book
        gateway.set_mark_price("ETH/USDT", dec!(2939)).await;
        assert!(gateway.fetch_positions().await.unwrap().is_empty());
        assert!(gateway.fetch_open_orders(None).await.unwrap().is_empty());

        let fills = gateway.fetch_my_trades("ETH/USDT", 0).await.unwrap();
        let closing = fills.iter().find(|f| f.reduce_only).unwrap();
        assert_eq!(closing.price, dec!(2940));
    }

    #[tokio::test]
    async fn test_duplicate_client_order_id_rejected() {
        let gateway = PaperGateway::new(None, dec!(10000));
        gateway.set_mark_price("BTC/USDT", dec!(50000)).await;

        let request = market_request(OrderSide::Buy, dec!(0.1), false);
        gateway.create_order(&request).await.unwrap();
        let err = gateway.create_order(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Exchange { code: -4015, .. }));
    }

    #[tokio::test]
    async fn test_reduce_only_without_position_rejected() {
        let gateway = PaperGateway::new(None, dec!(10000));
        gateway.set_mark_price("BTC/USDT", dec!(50000)).await;
        let err = gateway
            .create_order(&market_request(OrderSide::Sell, dec!(0.1), true))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Exchange { code: -2022, .. }));
    }

    #[tokio::test]
    async fn test_force_liquidation_flags_fill() {
        let gateway = PaperGateway::new(None, dec!(10000));
        gateway.set_mark_price("BTC/USDT", dec!(50000)).await;
        gateway
            .create_order(&market_request(OrderSide::Buy, dec!(0.1), false))
            .await
            .unwrap();

        gateway
            .force_liquidate("BTC/USDT", OrderSide::Buy, dec!(42000))
            .await;
        let fills = gateway.fetch_my_trades("BTC/USDT", 0).await.unwrap();
        assert!(fills.iter().any(|f| f.is_liquidation));
        assert!(gateway.fetch_positions().await.unwrap().is_empty());
    }
}
