//! Market models and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Price, Quantity};

/// Aggregated resting quantity at one price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price
    pub price: Price,
    /// Total remaining quantity at this price
    pub quantity: Quantity,
    /// Number of resting orders at this price
    pub orders: usize,
}

/// Order book depth for one instrument.
///
/// Resting market orders have no price and are reported separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDepth {
    /// Instrument symbol
    pub symbol: String,
    /// Bid levels, best (highest) first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best (lowest) first
    pub asks: Vec<PriceLevel>,
    /// Remaining quantity of resting market buys
    pub market_bids: Quantity,
    /// Remaining quantity of resting market sells
    pub market_asks: Quantity,
    /// Last trade price
    pub last_price: Price,
    /// Snapshot timestamp
    pub timestamp: DateTime<Utc>,
}

impl MarketDepth {
    /// Best bid price
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|level| level.price)
    }

    /// Best ask price
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|level| level.price)
    }

    /// Whether the book holds no resting orders
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty() && self.market_bids == 0 && self.market_asks == 0
    }
}
