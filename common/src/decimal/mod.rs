//! Decimal type utilities for precise financial calculations

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;

use crate::error::{Error, Result};

/// Price per share with high precision
pub type Price = Decimal;

/// Number of shares. Shares only trade in whole units.
pub type Quantity = u64;

/// Cash amount (typically Price * Quantity)
pub type Amount = Decimal;

/// Cash value of `quantity` shares at `price`.
///
/// Fails with `DecimalError` when the product leaves the decimal range.
pub fn notional(price: Price, quantity: Quantity) -> Result<Amount> {
    price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| Error::DecimalError(format!("{} x {} overflows", quantity, price)))
}

/// Largest whole number of shares that `amount` pays for at `price`.
///
/// Returns `None` when the price is not positive, in which case any
/// quantity is affordable.
pub fn affordable_quantity(amount: Amount, price: Price) -> Option<Quantity> {
    if price <= Decimal::ZERO {
        return None;
    }
    let shares = amount.checked_div(price)?.floor();
    Some(shares.to_u64().unwrap_or(u64::MAX))
}

/// Precision helpers for common operations
pub mod precision {
    use super::*;

    /// Default number of decimal places accepted on a limit price
    pub const PRICE_PRECISION: u32 = 4;

    /// Whether `price` is expressible with at most `scale` decimal places
    pub fn fits_scale(price: Price, scale: u32) -> bool {
        price.normalize().scale() <= scale
    }
}
