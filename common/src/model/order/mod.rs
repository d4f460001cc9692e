//! Order models and related types
//!
//! An [`Order`] is built once by [`OrderBuilder`]; after that its side,
//! kind, quantity, limit price, owner and symbol never change. Status,
//! remaining quantity and cash escrow only move through [`Order::apply_fill`]
//! and [`Order::cancel`], which enforce the lifecycle
//! `Open -> PartiallyFilled* -> Filled | Cancelled`.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{affordable_quantity, notional, Amount, Price, Quantity};
use crate::error::{Error, Result};
use crate::model::ids::{AccountId, OrderId};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Executes against the best available opposite price, no price limit
    Market,
    /// Executes at the specified price or better
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Resting with nothing filled
    Open,
    /// Resting with part of the quantity filled
    PartiallyFilled,
    /// Fully filled
    Filled,
    /// Cancelled before being fully filled
    Cancelled,
}

impl Status {
    /// Filled and Cancelled are final
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Filled | Status::Cancelled)
    }

    /// Open and PartiallyFilled orders can still match or be cancelled
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Status after a fill that leaves `remaining` shares open
    pub fn after_fill(self, remaining: Quantity) -> Result<Status> {
        match self {
            Status::Open | Status::PartiallyFilled if remaining == 0 => Ok(Status::Filled),
            Status::Open | Status::PartiallyFilled => Ok(Status::PartiallyFilled),
            Status::Filled | Status::Cancelled => {
                Err(Error::AlreadyTerminal(format!("cannot fill an order that is {}", self)))
            }
        }
    }

    /// Status after a cancel request
    pub fn cancel(self) -> Result<Status> {
        match self {
            Status::Open | Status::PartiallyFilled => Ok(Status::Cancelled),
            Status::Filled | Status::Cancelled => {
                Err(Error::AlreadyTerminal(format!("order is {}", self)))
            }
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Open => write!(f, "OPEN"),
            Status::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Status::Filled => write!(f, "FILLED"),
            Status::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Cash movement produced by one fill of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    /// Status after the fill
    pub status: Status,
    /// Escrowed cash paid to the counterparty (buy orders only)
    pub cash_spent: Amount,
    /// Escrowed cash no longer needed and returned to the owner
    pub cash_released: Amount,
}

/// Resources handed back to the owner when an order is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Release {
    /// Cash escrow still held by the order
    pub cash: Amount,
    /// Reserved shares still held by the order
    pub shares: Quantity,
}

/// Order model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    owner: AccountId,
    symbol: String,
    side: Side,
    order_type: OrderType,
    quantity: Quantity,
    remaining_quantity: Quantity,
    limit_price: Option<Price>,
    status: Status,
    /// Submission sequence number, assigned when the engine accepts the order
    sequence: u64,
    /// Cash still held in escrow for a buy order
    escrow: Amount,
    average_fill_price: Option<Price>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Start building an order
    pub fn builder() -> OrderBuilder {
        OrderBuilder::new()
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Original quantity
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity
    }

    /// Cumulative matched quantity
    pub fn filled_quantity(&self) -> Quantity {
        self.quantity - self.remaining_quantity
    }

    /// Limit price; always `None` for market orders
    pub fn limit_price(&self) -> Option<Price> {
        self.limit_price
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn escrow(&self) -> Amount {
        self.escrow
    }

    pub fn average_fill_price(&self) -> Option<Price> {
        self.average_fill_price
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_market(&self) -> bool {
        self.order_type == OrderType::Market
    }

    /// Check if the order is fully filled
    pub fn is_filled(&self) -> bool {
        self.status == Status::Filled
    }

    /// Check if the order is active (can be matched or cancelled)
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Shares a sell order keeps reserved while it rests
    pub fn reserved_shares(&self) -> Quantity {
        match (self.side, self.status.is_active()) {
            (Side::Sell, true) => self.remaining_quantity,
            _ => 0,
        }
    }

    /// Stamp the order as accepted by the engine.
    ///
    /// `escrow` is the cash reserved on the owner's account for a buy order
    /// and must be zero for a sell order.
    pub fn accept(&mut self, sequence: u64, escrow: Amount) {
        self.sequence = sequence;
        self.escrow = escrow;
        self.updated_at = Utc::now();
    }

    /// Largest quantity this order can take at `price`.
    ///
    /// Only a market buy is bounded by anything other than its remaining
    /// quantity: it never spends more than its escrow.
    pub fn max_fill_at(&self, price: Price) -> Quantity {
        match (self.side, self.order_type) {
            (Side::Buy, OrderType::Market) => affordable_quantity(self.escrow, price)
                .map_or(self.remaining_quantity, |q| q.min(self.remaining_quantity)),
            _ => self.remaining_quantity,
        }
    }

    /// Record a fill of `quantity` shares at `price`.
    ///
    /// Nothing is mutated when the fill is rejected.
    pub fn apply_fill(&mut self, quantity: Quantity, price: Price) -> Result<FillOutcome> {
        if quantity == 0 || quantity > self.remaining_quantity {
            return Err(Error::Internal(format!(
                "fill of {} exceeds remaining {} on order {}",
                quantity, self.remaining_quantity, self.id
            )));
        }
        let remaining = self.remaining_quantity - quantity;
        let status = self.status.after_fill(remaining)?;
        let cost = notional(price, quantity)?;
        if self.side == Side::Buy && cost > self.escrow {
            return Err(Error::Internal(format!(
                "fill cost {} exceeds escrow {} on order {}",
                cost, self.escrow, self.id
            )));
        }

        let previous_filled = self.filled_quantity();
        let average = match self.average_fill_price {
            Some(average) => average
                .checked_mul(Decimal::from(previous_filled))
                .and_then(|spent| spent.checked_add(cost))
                .and_then(|spent| spent.checked_div(Decimal::from(previous_filled + quantity)))
                .ok_or_else(|| Error::DecimalError(format!("average fill price of order {} overflows", self.id)))?,
            None => price,
        };
        let (cash_spent, cash_released) = match self.side {
            Side::Buy => (cost, self.excess_escrow(self.escrow - cost, remaining)?),
            Side::Sell => (Amount::ZERO, Amount::ZERO),
        };

        self.remaining_quantity = remaining;
        self.status = status;
        self.average_fill_price = Some(average);
        self.escrow -= cash_spent + cash_released;
        self.updated_at = Utc::now();
        Ok(FillOutcome {
            status,
            cash_spent,
            cash_released,
        })
    }

    /// Cancel the order, returning whatever it still holds in reserve.
    pub fn cancel(&mut self) -> Result<Release> {
        let status = self.status.cancel()?;
        let release = Release {
            cash: std::mem::take(&mut self.escrow),
            shares: self.reserved_shares(),
        };
        self.status = status;
        self.updated_at = Utc::now();
        Ok(release)
    }

    // Escrow a limit buy no longer needs after a fill below its limit, or
    // whatever is left once a buy is complete.
    fn excess_escrow(&self, escrow: Amount, remaining: Quantity) -> Result<Amount> {
        if remaining == 0 {
            return Ok(escrow);
        }
        Ok(match (self.order_type, self.limit_price) {
            (OrderType::Limit, Some(limit)) => (escrow - notional(limit, remaining)?).max(Amount::ZERO),
            _ => Amount::ZERO,
        })
    }
}

/// Builder for [`Order`]
#[derive(Debug, Clone, Default)]
pub struct OrderBuilder {
    owner: Option<AccountId>,
    symbol: Option<String>,
    side: Option<Side>,
    order_type: Option<OrderType>,
    quantity: Quantity,
    limit_price: Option<Price>,
}

impl OrderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_owner(mut self, owner: AccountId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn buy(mut self, quantity: Quantity) -> Self {
        self.side = Some(Side::Buy);
        self.quantity = quantity;
        self
    }

    pub fn sell(mut self, quantity: Quantity) -> Self {
        self.side = Some(Side::Sell);
        self.quantity = quantity;
        self
    }

    pub fn side(mut self, side: Side, quantity: Quantity) -> Self {
        self.side = Some(side);
        self.quantity = quantity;
        self
    }

    pub fn at_market_price(mut self) -> Self {
        self.order_type = Some(OrderType::Market);
        self.limit_price = None;
        self
    }

    pub fn with_limit(mut self, limit_price: Price) -> Self {
        self.order_type = Some(OrderType::Limit);
        self.limit_price = Some(limit_price);
        self
    }

    /// Set the kind explicitly; the limit price is ignored for market orders
    pub fn kind(mut self, order_type: OrderType, limit_price: Option<Price>) -> Self {
        self.order_type = Some(order_type);
        self.limit_price = limit_price;
        self
    }

    /// Validate and build the order in the `Open` state
    pub fn build(self) -> Result<Order> {
        let owner = self
            .owner
            .ok_or_else(|| Error::InvalidOrder("owner is not set".to_string()))?;
        let symbol = self
            .symbol
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidOrder("instrument symbol is not set".to_string()))?;
        let side = self
            .side
            .ok_or_else(|| Error::InvalidOrder("side is not set".to_string()))?;
        if self.quantity == 0 {
            return Err(Error::InvalidOrder("quantity must be positive".to_string()));
        }
        let order_type = self
            .order_type
            .ok_or_else(|| Error::InvalidOrder("order kind is not set".to_string()))?;
        let limit_price = match order_type {
            OrderType::Market => None,
            OrderType::Limit => match self.limit_price {
                Some(price) if price >= Decimal::ZERO => Some(price),
                Some(price) => {
                    return Err(Error::InvalidOrder(format!("negative limit price {}", price)))
                }
                None => {
                    return Err(Error::InvalidOrder("limit order requires a limit price".to_string()))
                }
            },
        };

        let now = Utc::now();
        Ok(Order {
            id: OrderId::new(),
            owner,
            symbol,
            side,
            order_type,
            quantity: self.quantity,
            remaining_quantity: self.quantity,
            limit_price,
            status: Status::Open,
            sequence: 0,
            escrow: Amount::ZERO,
            average_fill_price: None,
            created_at: now,
            updated_at: now,
        })
    }
}
