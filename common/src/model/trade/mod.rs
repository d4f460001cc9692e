//! Trade models and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{notional, Amount, Price, Quantity};
use crate::error::Result;
use crate::model::ids::{AccountId, OrderId, TradeId};
use crate::model::order::{Order, Side};

/// Trade model representing a matched pair of orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade ID
    pub id: TradeId,
    /// Instrument symbol (e.g., "AAPL")
    pub symbol: String,
    /// Price at which the trade executed
    pub price: Price,
    /// Quantity traded
    pub quantity: Quantity,
    /// Total amount (price * quantity)
    pub amount: Amount,
    /// Buyer order ID
    pub buyer_order_id: OrderId,
    /// Seller order ID
    pub seller_order_id: OrderId,
    /// Buyer account ID
    pub buyer_id: AccountId,
    /// Seller account ID
    pub seller_id: AccountId,
    /// Side of the more recently submitted order
    pub taker_side: Side,
    /// Timestamp when the trade occurred
    pub created_at: DateTime<Utc>,
}

impl Trade {
    /// Create a new trade from matched orders
    pub fn new(price: Price, quantity: Quantity, buy: &Order, sell: &Order) -> Result<Self> {
        let taker_side = if buy.sequence() > sell.sequence() { Side::Buy } else { Side::Sell };
        Ok(Self {
            id: TradeId::new(),
            symbol: buy.symbol().to_string(),
            price,
            quantity,
            amount: notional(price, quantity)?,
            buyer_order_id: buy.id(),
            seller_order_id: sell.id(),
            buyer_id: buy.owner(),
            seller_id: sell.owner(),
            taker_side,
            created_at: Utc::now(),
        })
    }
}
