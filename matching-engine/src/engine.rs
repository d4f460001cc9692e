//! The matching engine: order admission, the continuous double auction and
//! cancellation.
//!
//! Each instrument's [`OrderBook`] sits behind its own mutex. Admission
//! (reservation, sequencing, insertion), the whole matching loop that
//! follows and every cancellation for that instrument run inside that one
//! critical section. Account locks are only ever taken while a book lock is
//! held, never the other way round.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use account_service::{AccountRegistry, AccountService, LedgerAccount};
use common::decimal::precision::fits_scale;
use common::decimal::{notional, Amount, Price, Quantity};
use common::error::{Error, Result};
use common::model::market::MarketDepth;
use common::model::order::{FillOutcome, Order, OrderType, Side, Status};
use common::model::trade::Trade;
use common::{AccountId, OrderId, SubscriptionId};
use dashmap::DashMap;
use market_data::{Instrument, InstrumentRegistry, NotificationHub, PriceObserver};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::order_book::{BookSide, OrderBook, RestingOrder, SidePriority};
use crate::policy::can_execute;

/// Result of a matching operation
#[derive(Debug, Clone)]
pub struct MatchingResult {
    /// The submitted order as it stands once matching stopped
    pub order: Order,
    /// Trades executed by this submission, in execution order
    pub trades: Vec<Trade>,
}

/// Next step of the matching loop
enum Step {
    /// Top of book does not cross
    Idle,
    /// The best bid is a market buy whose escrow cannot pay for one share
    Exhausted(OrderId),
    /// Trade `quantity` at `price`
    Trade { price: Price, quantity: Quantity },
}

/// Price a crossing pair trades at.
///
/// The older order's limit price is honored. A market order takes the other
/// side's limit price, and two market orders trade at the last trade price.
pub fn trade_price(bid: &Order, ask: &Order, last_price: Price) -> Price {
    match (bid.limit_price(), ask.limit_price()) {
        (Some(bid_price), Some(ask_price)) => {
            if bid.sequence() < ask.sequence() {
                bid_price
            } else {
                ask_price
            }
        }
        (Some(bid_price), None) => bid_price,
        (None, Some(ask_price)) => ask_price,
        (None, None) => last_price,
    }
}

/// The matching engine responsible for processing orders and generating trades
pub struct MatchingEngine {
    accounts: Arc<dyn AccountRegistry>,
    instruments: Arc<InstrumentRegistry>,
    notifier: Arc<NotificationHub>,
    /// Map of instrument symbols to order books
    order_books: DashMap<String, Arc<Mutex<OrderBook>>>,
    /// Latest snapshot of every accepted order, terminal ones included
    orders: DashMap<OrderId, Order>,
    /// Accepted order ids per owner, in acceptance order
    owner_orders: DashMap<AccountId, Vec<OrderId>>,
    sequence: AtomicU64,
    config: EngineConfig,
}

impl MatchingEngine {
    /// Create a new matching engine
    pub fn new(
        accounts: Arc<dyn AccountRegistry>,
        instruments: Arc<InstrumentRegistry>,
        notifier: Arc<NotificationHub>,
        config: EngineConfig,
    ) -> Self {
        Self {
            accounts,
            instruments,
            notifier,
            order_books: DashMap::new(),
            orders: DashMap::new(),
            owner_orders: DashMap::new(),
            sequence: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn instruments(&self) -> &Arc<InstrumentRegistry> {
        &self.instruments
    }

    pub fn notifier(&self) -> &Arc<NotificationHub> {
        &self.notifier
    }

    /// List a new instrument and open its order book
    pub fn list_instrument(&self, symbol: &str, initial_price: Price) -> Result<Arc<Instrument>> {
        if initial_price > self.config.max_price {
            return Err(Error::ValidationError(format!(
                "listing price {} of {} is above the maximum of {}",
                initial_price, symbol, self.config.max_price
            )));
        }
        let instrument = self.instruments.list(symbol, initial_price)?;
        self.book_for(&instrument);
        info!("Opened order book for {}", instrument.symbol());
        Ok(instrument)
    }

    fn book_for(&self, instrument: &Instrument) -> Arc<Mutex<OrderBook>> {
        self.order_books
            .entry(instrument.symbol().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(OrderBook::new(instrument.symbol()))))
            .clone()
    }

    fn lock(book: &Mutex<OrderBook>) -> MutexGuard<'_, OrderBook> {
        // A poisoned book means an invariant assertion already fired
        book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit an order and return its id
    pub fn submit(&self, order: Order) -> Result<OrderId> {
        self.place_order(order).map(|result| result.order.id())
    }

    /// Validate, reserve, book and match an order.
    ///
    /// A rejected order leaves every account untouched and never becomes
    /// visible in a book or in the order registry.
    pub fn place_order(&self, order: Order) -> Result<MatchingResult> {
        self.validate(&order).map_err(|e| {
            warn!("Rejected order {}: {}", order.id(), e);
            e
        })?;
        let instrument = self.instruments.get_instrument(order.symbol())?;
        let account = self.accounts.get_account(order.owner())?;
        let book = self.book_for(&instrument);
        let mut book = Self::lock(&book);

        let escrow = self.reserve(&book, &instrument, &account, &order).map_err(|e| {
            warn!("Rejected order {}: {}", order.id(), e);
            e
        })?;

        let mut order = order;
        order.accept(self.sequence.fetch_add(1, Ordering::SeqCst) + 1, escrow);
        info!(
            "Accepted order {} #{}: {} {} {} {} @ {:?}",
            order.id(),
            order.sequence(),
            order.side(),
            order.order_type(),
            order.quantity(),
            order.symbol(),
            order.limit_price()
        );
        let order_id = order.id();
        self.owner_orders.entry(order.owner()).or_default().push(order_id);
        self.record(&order);
        book.insert(RestingOrder { order, account });
        debug!("Booked order {} on {}", order_id, instrument.symbol());

        let trades = self.match_orders(&mut book, &instrument);
        let order = self.order(order_id)?;
        Ok(MatchingResult { order, trades })
    }

    fn validate(&self, order: &Order) -> Result<()> {
        self.ensure_unseen(order)?;
        if order.quantity() > self.config.max_order_quantity {
            return Err(Error::InvalidOrder(format!(
                "quantity {} exceeds the maximum of {}",
                order.quantity(),
                self.config.max_order_quantity
            )));
        }
        if let Some(price) = order.limit_price() {
            if price > self.config.max_price {
                return Err(Error::InvalidOrder(format!(
                    "limit price {} is above the maximum of {}",
                    price, self.config.max_price
                )));
            }
            if self.config.strict_prices && !fits_scale(price, self.config.price_scale) {
                return Err(Error::InvalidOrder(format!(
                    "limit price {} has more than {} decimal places",
                    price, self.config.price_scale
                )));
            }
            notional(price, order.quantity())
                .map_err(|e| Error::InvalidOrder(format!("order value is out of range: {}", e)))?;
        }
        Ok(())
    }

    fn ensure_unseen(&self, order: &Order) -> Result<()> {
        if order.sequence() != 0 || self.orders.contains_key(&order.id()) {
            return Err(Error::InvalidOrder(format!("order {} was already submitted", order.id())));
        }
        Ok(())
    }

    /// Hold the order's cash or shares on its owner's account.
    ///
    /// Runs under the book lock. Every copy of an order id maps to the same
    /// book, so the id is checked again here and only one copy gets through.
    fn reserve(
        &self,
        book: &OrderBook,
        instrument: &Instrument,
        account: &LedgerAccount,
        order: &Order,
    ) -> Result<Amount> {
        self.ensure_unseen(order)?;
        let escrow = match (order.side(), order.order_type(), order.limit_price()) {
            (Side::Buy, OrderType::Limit, Some(limit)) => notional(limit, order.quantity())?,
            (Side::Buy, _, _) => book
                .sweep_cost(order.quantity(), instrument.last_price())
                .map_err(|e| Error::InvalidOrder(format!("market buy of {} cannot be priced: {}", order.quantity(), e)))?,
            (Side::Sell, _, _) => Amount::ZERO,
        };
        AccountService::reserve_for_order(account, order, escrow)?;
        Ok(escrow)
    }

    /// Store the latest snapshot and notify the owner
    fn record(&self, order: &Order) {
        self.orders.insert(order.id(), order.clone());
        self.notifier.publish_status(order);
    }

    /// Run the continuous double auction until the top of book no longer
    /// crosses
    fn match_orders(&self, book: &mut OrderBook, instrument: &Instrument) -> Vec<Trade> {
        let mut trades = Vec::new();
        loop {
            match Self::next_step(book, instrument.last_price()) {
                Step::Idle => break,
                Step::Exhausted(order_id) => {
                    debug!("Market buy {} cannot afford another share", order_id);
                    if let Err(e) = self.cancel_resting(book, order_id, Side::Buy) {
                        panic!("market buy {} at the top of the book could not be cancelled: {}", order_id, e);
                    }
                }
                Step::Trade { price, quantity } => {
                    let (buy, buy_fill, buyer) = Self::fill_best(book.bids_mut(), quantity, price);
                    let (sell, _, seller) = Self::fill_best(book.asks_mut(), quantity, price);

                    let trade = match Trade::new(price, quantity, &buy, &sell) {
                        Ok(trade) => trade,
                        Err(e) => panic!("filled trade of {} at {} has no value: {}", quantity, price, e),
                    };
                    AccountService::settle_trade(&buyer, &seller, &trade, buy_fill.cash_released);
                    info!(
                        "Trade {}: {} {} at {} (buy {} / sell {})",
                        trade.id, trade.quantity, trade.symbol, trade.price, buy.id(), sell.id()
                    );

                    self.record(&buy);
                    self.record(&sell);
                    self.notifier.publish_trade(instrument, &trade);
                    trades.push(trade);
                }
            }
        }
        trades
    }

    fn next_step(book: &OrderBook, last_price: Price) -> Step {
        let (Some(bid), Some(ask)) = (book.bids().best(), book.asks().best()) else {
            return Step::Idle;
        };
        let price = trade_price(&bid.order, &ask.order, last_price);
        if !can_execute(&bid.order, price) || !can_execute(&ask.order, price) {
            return Step::Idle;
        }
        let quantity = bid
            .order
            .remaining_quantity()
            .min(ask.order.remaining_quantity())
            .min(bid.order.max_fill_at(price));
        if quantity == 0 {
            return Step::Exhausted(bid.order.id());
        }
        Step::Trade { price, quantity }
    }

    /// Fill the best order of one side, dropping it from the book once filled
    fn fill_best<P: SidePriority>(
        side: &mut BookSide<P>,
        quantity: Quantity,
        price: Price,
    ) -> (Order, FillOutcome, Arc<LedgerAccount>) {
        let Some(resting) = side.best_mut() else {
            unreachable!("best order vanished from a locked book");
        };
        let outcome = match resting.order.apply_fill(quantity, price) {
            Ok(outcome) => outcome,
            Err(e) => panic!("fill of {} at {} broke order {}: {}", quantity, price, resting.order.id(), e),
        };
        let order = resting.order.clone();
        let account = resting.account.clone();
        if order.is_filled() {
            side.remove(order.id());
        }
        (order, outcome, account)
    }

    /// Cancel an active order.
    ///
    /// Fails with `OrderNotFound` for an unknown id and `AlreadyTerminal`
    /// when the order was filled or cancelled first.
    pub fn cancel(&self, order_id: OrderId) -> Result<Order> {
        let (symbol, side) = self
            .orders
            .get(&order_id)
            .map(|order| (order.symbol().to_string(), order.side()))
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
        let book = self
            .order_books
            .get(&symbol)
            .map(|book| book.value().clone())
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))?;
        let mut book = Self::lock(&book);
        self.cancel_resting(&mut book, order_id, side)
    }

    fn cancel_resting(&self, book: &mut OrderBook, order_id: OrderId, side: Side) -> Result<Order> {
        let Some(RestingOrder { mut order, account }) = book.remove(order_id, side) else {
            let status = self.status_of(order_id)?;
            return Err(Error::AlreadyTerminal(format!("order {} is {}", order_id, status)));
        };
        let release = match order.cancel() {
            Ok(release) => release,
            Err(e) => panic!("resting order {} could not be cancelled: {}", order_id, e),
        };
        AccountService::release_for_order(&account, &order, release);
        info!("Cancelled order {} with {} remaining", order_id, order.remaining_quantity());
        self.record(&order);
        Ok(order)
    }

    /// Current status of an order
    pub fn status_of(&self, order_id: OrderId) -> Result<Status> {
        self.orders
            .get(&order_id)
            .map(|order| order.status())
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))
    }

    /// Latest snapshot of an order
    pub fn order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(&order_id)
            .map(|order| order.value().clone())
            .ok_or_else(|| Error::OrderNotFound(order_id.to_string()))
    }

    /// Every order accepted for `owner`, oldest first
    pub fn orders_for(&self, owner: AccountId) -> Vec<Order> {
        let ids = self.owner_orders.get(&owner).map(|ids| ids.value().clone()).unwrap_or_default();
        ids.into_iter().filter_map(|id| self.order(id).ok()).collect()
    }

    /// Aggregated book depth for `symbol`
    pub fn depth(&self, symbol: &str, levels: usize) -> Result<MarketDepth> {
        let instrument = self.instruments.get_instrument(symbol)?;
        let book = self.book_for(&instrument);
        let book = Self::lock(&book);
        Ok(book.depth(levels, instrument.last_price()))
    }

    /// Every order resting in the book of `symbol`, bids then asks
    pub fn resting_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        let instrument = self.instruments.get_instrument(symbol)?;
        let book = self.book_for(&instrument);
        let book = Self::lock(&book);
        Ok(book.orders().cloned().collect())
    }

    /// Last trade price of `symbol`
    pub fn last_price(&self, symbol: &str) -> Result<Price> {
        Ok(self.instruments.get_instrument(symbol)?.last_price())
    }

    /// Register a trade observer on `symbol`
    pub fn subscribe_price(&self, symbol: &str, observer: Arc<dyn PriceObserver>) -> Result<SubscriptionId> {
        Ok(self.instruments.get_instrument(symbol)?.subscribe(observer))
    }

    /// Remove a trade observer from `symbol`
    pub fn unsubscribe_price(&self, symbol: &str, subscription: SubscriptionId) -> Result<bool> {
        Ok(self.instruments.get_instrument(symbol)?.unsubscribe(subscription))
    }
}
