use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::StopMarket => write!(f, "STOP_MARKET"),
            OrderType::TakeProfitMarket => write!(f, "TAKE_PROFIT_MARKET"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Open,
    Partial,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Allowed forward transitions. Status is monotone along
    /// pending -> open -> partial -> filled; any non-terminal state may
    /// move to cancelled / rejected / expired.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Pending => matches!(next, Open | Partial | Filled | Cancelled | Rejected | Expired),
            Open => matches!(next, Partial | Filled | Cancelled | Expired),
            Partial => matches!(next, Partial | Filled | Cancelled | Expired),
            Filled | Cancelled | Rejected | Expired => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Open => "open",
            OrderStatus::Partial => "partial",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "open" => Ok(OrderStatus::Open),
            "partial" => Ok(OrderStatus::Partial),
            "filled" => Ok(OrderStatus::Filled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "rejected" => Ok(OrderStatus::Rejected),
            "expired" => Ok(OrderStatus::Expired),
            _ => anyhow::bail!("Unknown order status: {}", s),
        }
    }
}

/// What the executor asks the gateway to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub reduce_only: bool,
    /// UUIDv4 idempotency key; the venue dedups on it and the orders
    /// table carries a unique index on it.
    pub client_order_id: String,
}

/// A tracked order, local mirror of the venue row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Venue-assigned id, absent until the venue acknowledges.
    pub id: Option<String>,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Option<Decimal>,
    pub amount: Decimal,
    pub filled: Decimal,
    pub average: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub fee_currency: Option<String>,
    pub stop_price: Option<Decimal>,
    pub reduce_only: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub linked_decision_id: Option<i64>,
    pub raw_payload: Option<serde_json::Value>,
}

impl Order {
    pub fn from_request(req: &OrderRequest, now_ms: i64, decision_id: Option<i64>) -> Self {
        Self {
            id: None,
            client_order_id: req.client_order_id.clone(),
            symbol: req.symbol.clone(),
            side: req.side,
            order_type: req.order_type,
            status: OrderStatus::Pending,
            price: req.price,
            amount: req.amount,
            filled: Decimal::ZERO,
            average: None,
            fee: None,
            fee_currency: None,
            stop_price: req.stop_price,
            reduce_only: req.reduce_only,
            created_at: now_ms,
            updated_at: now_ms,
            linked_decision_id: decision_id,
            raw_payload: None,
        }
    }

    /// Record fill progress keeping `filled` monotone and bounded by
    /// `amount`; out-of-order updates are ignored.
    pub fn record_fill(&mut self, filled: Decimal, average: Option<Decimal>, now_ms: i64) {
        if filled < self.filled {
            return;
        }
        self.filled = filled.min(self.amount);
        if average.is_some() {
            self.average = average;
        }
        self.updated_at = now_ms;
        if self.filled == self.amount {
            self.status = OrderStatus::Filled;
        } else if self.filled > Decimal::ZERO {
            self.status = OrderStatus::Partial;
        }
    }

    pub fn transition(&mut self, next: OrderStatus, now_ms: i64) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            self.updated_at = now_ms;
            true
        } else {
            false
        }
    }
}

/// A single execution as reported by the venue trade feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFill {
    pub id: String,
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub cost: Decimal,
    pub fee: Decimal,
    pub fee_currency: Option<String>,
    pub timestamp: i64,
    /// Set when the venue marks the fill as a forced liquidation.
    pub is_liquidation: bool,
    /// True when the fill decreases an open position.
    pub reduce_only: bool,
}

/// Volume-weighted average price over a set of fills.
pub fn vwap(fills: &[TradeFill]) -> Option<Decimal> {
    let total_amount: Decimal = fills.iter().map(|f| f.amount).sum();
    if total_amount.is_zero() {
        return None;
    }
    let weighted: Decimal = fills.iter().map(|f| f.price * f.amount).sum();
    Some(weighted / total_amount)
}
