//! Notification payloads delivered to subscribers and order owners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Price, Quantity};
use crate::model::ids::{AccountId, OrderId, TradeId};
use crate::model::order::{Order, Status};
use crate::model::trade::Trade;

/// Published to an instrument's subscribers for every trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub trade_id: TradeId,
    pub symbol: String,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: DateTime<Utc>,
}

impl From<&Trade> for TradeEvent {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.id,
            symbol: trade.symbol.clone(),
            price: trade.price,
            quantity: trade.quantity,
            timestamp: trade.created_at,
        }
    }
}

/// Published to an order's owner on every status transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order_id: OrderId,
    pub owner: AccountId,
    pub symbol: String,
    pub status: Status,
    pub remaining_quantity: Quantity,
    pub timestamp: DateTime<Utc>,
}

impl From<&Order> for OrderStatusEvent {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            owner: order.owner(),
            symbol: order.symbol().to_string(),
            status: order.status(),
            remaining_quantity: order.remaining_quantity(),
            timestamp: order.updated_at(),
        }
    }
}
