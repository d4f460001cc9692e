//! Configuration for the matching engine

use common::decimal::precision::PRICE_PRECISION;
use common::decimal::{Price, Quantity};

/// Order admission limits applied before any reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Largest quantity a single order may carry
    pub max_order_quantity: Quantity,
    /// Highest limit price accepted, and highest listing price
    pub max_price: Price,
    /// Maximum number of decimal places on a limit price
    pub price_scale: u32,
    /// Reject limit prices finer than `price_scale` instead of accepting them as is
    pub strict_prices: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_order_quantity: 1_000_000,
            max_price: Price::from(1_000_000_000u64),
            price_scale: PRICE_PRECISION,
            strict_prices: false,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with custom values
    pub fn new(max_order_quantity: Quantity, price_scale: u32, strict_prices: bool) -> Self {
        Self {
            max_order_quantity,
            price_scale,
            strict_prices,
            ..Self::default()
        }
    }

    pub fn with_max_price(mut self, max_price: Price) -> Self {
        self.max_price = max_price;
        self
    }
}
