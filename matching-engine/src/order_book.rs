//! Order book implementation for price-time priority matching

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use account_service::LedgerAccount;
use chrono::Utc;
use common::decimal::{notional, Amount, Price, Quantity};
use common::error::{Error, Result};
use common::model::market::{MarketDepth, PriceLevel};
use common::model::order::{Order, Side};
use common::OrderId;

/// An active order sitting in the book together with its owner's account
#[derive(Debug, Clone)]
pub struct RestingOrder {
    pub order: Order,
    pub account: Arc<LedgerAccount>,
}

/// Sort key of one side of the book
pub trait SidePriority: Ord + Copy + fmt::Debug {
    fn of(order: &Order) -> Self;
}

/// Bid ordering: market orders first, then highest price, then lowest sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BidPriority {
    limit: bool,
    price: Reverse<Price>,
    sequence: u64,
}

impl SidePriority for BidPriority {
    fn of(order: &Order) -> Self {
        Self {
            limit: !order.is_market(),
            price: Reverse(order.limit_price().unwrap_or_default()),
            sequence: order.sequence(),
        }
    }
}

/// Ask ordering: market orders first, then lowest price, then lowest sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AskPriority {
    limit: bool,
    price: Price,
    sequence: u64,
}

impl SidePriority for AskPriority {
    fn of(order: &Order) -> Self {
        Self {
            limit: !order.is_market(),
            price: order.limit_price().unwrap_or_default(),
            sequence: order.sequence(),
        }
    }
}

/// One side of the book
#[derive(Debug)]
pub struct BookSide<P: SidePriority> {
    /// Priority queue of order ids, best first
    queue: BTreeMap<P, OrderId>,
    /// Index for lookup by order id
    orders: HashMap<OrderId, (P, RestingOrder)>,
}

/// The buy side of the order book (bids)
pub type BidSide = BookSide<BidPriority>;

/// The sell side of the order book (asks)
pub type AskSide = BookSide<AskPriority>;

impl<P: SidePriority> Default for BookSide<P> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            orders: HashMap::new(),
        }
    }
}

impl<P: SidePriority> BookSide<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an order. Its sequence number must already be assigned.
    pub fn insert(&mut self, resting: RestingOrder) {
        assert!(
            resting.order.is_active() && resting.order.remaining_quantity() > 0,
            "order {} is not active and cannot rest",
            resting.order.id()
        );
        let key = P::of(&resting.order);
        let id = resting.order.id();
        let previous = self.queue.insert(key, id);
        assert!(previous.is_none(), "duplicate priority key for order {}", id);
        self.orders.insert(id, (key, resting));
    }

    /// Remove an order by ID
    pub fn remove(&mut self, order_id: OrderId) -> Option<RestingOrder> {
        let (key, resting) = self.orders.remove(&order_id)?;
        self.queue.remove(&key);
        Some(resting)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.orders.contains_key(&order_id)
    }

    pub fn get(&self, order_id: OrderId) -> Option<&RestingOrder> {
        self.orders.get(&order_id).map(|(_, resting)| resting)
    }

    /// Highest priority order
    pub fn best(&self) -> Option<&RestingOrder> {
        let (_, id) = self.queue.first_key_value()?;
        self.get(*id)
    }

    /// Highest priority order, mutably.
    ///
    /// Fills never change an order's priority key, so the order keeps its
    /// place in the queue.
    pub fn best_mut(&mut self) -> Option<&mut RestingOrder> {
        let (_, id) = self.queue.first_key_value()?;
        self.orders.get_mut(id).map(|(_, resting)| resting)
    }

    /// Orders in priority order
    pub fn iter(&self) -> impl Iterator<Item = &RestingOrder> + '_ {
        self.queue
            .values()
            .filter_map(move |id| self.orders.get(id).map(|(_, resting)| resting))
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Best limit price on this side
    pub fn best_price(&self) -> Option<Price> {
        self.iter().find_map(|resting| resting.order.limit_price())
    }

    /// Limit orders aggregated by price, best first
    pub fn price_levels(&self, limit: usize) -> Vec<PriceLevel> {
        let mut levels: Vec<PriceLevel> = Vec::new();
        for resting in self.iter() {
            let Some(price) = resting.order.limit_price() else {
                continue;
            };
            let full = levels.len() == limit;
            match levels.last_mut() {
                Some(level) if level.price == price => {
                    level.quantity += resting.order.remaining_quantity();
                    level.orders += 1;
                }
                _ if full => break,
                _ => levels.push(PriceLevel {
                    price,
                    quantity: resting.order.remaining_quantity(),
                    orders: 1,
                }),
            }
        }
        levels
    }

    /// Remaining quantity of resting market orders
    pub fn market_quantity(&self) -> Quantity {
        self.iter()
            .filter(|resting| resting.order.is_market())
            .map(|resting| resting.order.remaining_quantity())
            .sum()
    }
}

/// Order book for a single instrument
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    bids: BidSide,
    asks: AskSide,
}

impl OrderBook {
    /// Create a new empty order book for the given instrument
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BidSide::new(),
            asks: AskSide::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Add an order to the side it declares
    pub fn insert(&mut self, resting: RestingOrder) {
        match resting.order.side() {
            Side::Buy => self.bids.insert(resting),
            Side::Sell => self.asks.insert(resting),
        }
    }

    /// Remove an order from the book
    pub fn remove(&mut self, order_id: OrderId, side: Side) -> Option<RestingOrder> {
        match side {
            Side::Buy => self.bids.remove(order_id),
            Side::Sell => self.asks.remove(order_id),
        }
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.bids.contains(order_id) || self.asks.contains(order_id)
    }

    pub fn bids(&self) -> &BidSide {
        &self.bids
    }

    pub fn asks(&self) -> &AskSide {
        &self.asks
    }

    pub fn bids_mut(&mut self) -> &mut BidSide {
        &mut self.bids
    }

    pub fn asks_mut(&mut self) -> &mut AskSide {
        &mut self.asks
    }

    /// Get the best bid price
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    /// Get the best ask price
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Get the current spread
    pub fn spread(&self) -> Option<Price> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Number of resting orders on both sides
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Every resting order, bids first, each side in priority order
    pub fn orders(&self) -> impl Iterator<Item = &Order> + '_ {
        self.bids
            .iter()
            .chain(self.asks.iter())
            .map(|resting| &resting.order)
    }

    /// Cash a market buy of `quantity` needs to take liquidity from the
    /// current ask side.
    ///
    /// Asks are consumed in priority order, resting market sells valued at
    /// `last_price`. Quantity the book cannot cover is valued at the higher
    /// of `last_price` and the worst price swept.
    pub fn sweep_cost(&self, quantity: Quantity, last_price: Price) -> Result<Amount> {
        let mut remaining = quantity;
        let mut cost = Amount::ZERO;
        let mut worst = last_price;
        for resting in self.asks.iter() {
            if remaining == 0 {
                break;
            }
            let price = resting.order.limit_price().unwrap_or(last_price);
            let take = remaining.min(resting.order.remaining_quantity());
            cost = add(cost, notional(price, take)?)?;
            worst = worst.max(price);
            remaining -= take;
        }
        add(cost, notional(worst, remaining)?)
    }

    /// Aggregated depth, `levels` price levels per side
    pub fn depth(&self, levels: usize, last_price: Price) -> MarketDepth {
        MarketDepth {
            symbol: self.symbol.clone(),
            bids: self.bids.price_levels(levels),
            asks: self.asks.price_levels(levels),
            market_bids: self.bids.market_quantity(),
            market_asks: self.asks.market_quantity(),
            last_price,
            timestamp: Utc::now(),
        }
    }
}

fn add(total: Amount, amount: Amount) -> Result<Amount> {
    total
        .checked_add(amount)
        .ok_or_else(|| Error::DecimalError(format!("{} + {} overflows", total, amount)))
}
