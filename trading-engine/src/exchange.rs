//! The exchange context object.
//!
//! One [`Exchange`] owns the participant ledger, the listed instruments,
//! the notification fan-out and the matching engine. It is created once and
//! shared by handle (`Arc<Exchange>`) with every caller.

use std::sync::Arc;

use account_service::AccountService;
use common::decimal::{Amount, Price, Quantity};
use common::error::Result;
use common::model::account::AccountBalance;
use common::model::event::TradeEvent;
use common::model::market::MarketDepth;
use common::model::order::{Order, OrderType, Side, Status};
use common::{AccountId, OrderId, SubscriptionId};
use crossbeam_channel::Receiver;
use market_data::{Instrument, InstrumentRegistry, Message, NotificationHub, OrderObserver, PriceObserver, Topic};
use matching_engine::{EngineConfig, MatchingEngine, MatchingResult};
use tracing::info;

use crate::config::ExchangeConfig;

/// Library-level API of the exchange
pub struct Exchange {
    accounts: AccountService,
    engine: MatchingEngine,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Exchange {
    /// Create an exchange with no participants and no instruments
    pub fn new(config: EngineConfig) -> Self {
        let accounts = AccountService::new();
        let engine = MatchingEngine::new(
            accounts.registry(),
            Arc::new(InstrumentRegistry::new()),
            Arc::new(NotificationHub::new()),
            config,
        );
        Self { accounts, engine }
    }

    /// Create an exchange and list the configured instruments
    pub fn from_config(config: &ExchangeConfig) -> Result<Self> {
        let exchange = Self::new(config.engine.clone());
        for (symbol, price) in &config.instruments {
            exchange.list_instrument(symbol, *price)?;
        }
        info!("Exchange ready with {} instruments", config.instruments.len());
        Ok(exchange)
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    /// Open an account for a new participant
    pub fn register_participant(&self, name: &str, initial_cash: Amount) -> Result<AccountId> {
        Ok(self.accounts.open_account(name, initial_cash)?.id())
    }

    pub fn deposit_cash(&self, owner: AccountId, amount: Amount) -> Result<AccountBalance> {
        self.accounts.deposit_cash(owner, amount)
    }

    pub fn withdraw_cash(&self, owner: AccountId, amount: Amount) -> Result<AccountBalance> {
        self.accounts.withdraw_cash(owner, amount)
    }

    pub fn deposit_shares(&self, owner: AccountId, symbol: &str, quantity: Quantity) -> Result<AccountBalance> {
        let symbol = self.engine.instruments().get_instrument(symbol)?.symbol().to_string();
        self.accounts.deposit_shares(owner, &symbol, quantity)
    }

    pub fn withdraw_shares(&self, owner: AccountId, symbol: &str, quantity: Quantity) -> Result<AccountBalance> {
        let symbol = self.engine.instruments().get_instrument(symbol)?.symbol().to_string();
        self.accounts.withdraw_shares(owner, &symbol, quantity)
    }

    /// Cash and holdings of a participant
    pub fn get_balance(&self, owner: AccountId) -> Result<AccountBalance> {
        self.accounts.get_balance(owner)
    }

    pub fn list_instrument(&self, symbol: &str, initial_price: Price) -> Result<Arc<Instrument>> {
        self.engine.list_instrument(symbol, initial_price)
    }

    /// Build and submit an order
    pub fn place_order(
        &self,
        owner: AccountId,
        symbol: &str,
        side: Side,
        kind: OrderType,
        quantity: Quantity,
        limit_price: Option<Price>,
    ) -> Result<OrderId> {
        let order = Order::builder()
            .for_owner(owner)
            .with_symbol(symbol)
            .side(side, quantity)
            .kind(kind, limit_price)
            .build()?;
        self.engine.submit(order)
    }

    /// Submit a prebuilt order and return what it traded
    pub fn submit(&self, order: Order) -> Result<MatchingResult> {
        self.engine.place_order(order)
    }

    pub fn cancel_order(&self, order_id: OrderId) -> Result<()> {
        self.engine.cancel(order_id).map(|_| ())
    }

    pub fn get_order_status(&self, order_id: OrderId) -> Result<Status> {
        self.engine.status_of(order_id)
    }

    pub fn order_details(&self, order_id: OrderId) -> Result<Order> {
        self.engine.order(order_id)
    }

    /// Order history of a participant, oldest first
    pub fn orders_for(&self, owner: AccountId) -> Result<Vec<Order>> {
        self.accounts.get_account(owner)?;
        Ok(self.engine.orders_for(owner))
    }

    pub fn depth(&self, symbol: &str, levels: usize) -> Result<MarketDepth> {
        self.engine.depth(symbol, levels)
    }

    pub fn last_price(&self, symbol: &str) -> Result<Price> {
        self.engine.last_price(symbol)
    }

    /// Call `callback` for every trade on `symbol`
    pub fn subscribe_price<F>(&self, symbol: &str, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&TradeEvent) + Send + Sync + 'static,
    {
        self.subscribe_price_observer(symbol, Arc::new(callback))
    }

    pub fn subscribe_price_observer(&self, symbol: &str, observer: Arc<dyn PriceObserver>) -> Result<SubscriptionId> {
        self.engine.subscribe_price(symbol, observer)
    }

    pub fn unsubscribe_price(&self, symbol: &str, subscription: SubscriptionId) -> Result<bool> {
        self.engine.unsubscribe_price(symbol, subscription)
    }

    /// Channel receiving a [`Message::Trade`] for every trade on `symbol`
    pub fn subscribe_price_channel(&self, symbol: &str) -> Result<(SubscriptionId, Receiver<Message>)> {
        let instrument = self.engine.instruments().get_instrument(symbol)?;
        Ok(self.engine.notifier().subscribe(Topic::Trades(instrument.symbol().to_string())))
    }

    /// Observe every status transition of `owner`'s orders
    pub fn watch_orders(&self, owner: AccountId, observer: Arc<dyn OrderObserver>) -> Result<SubscriptionId> {
        self.accounts.get_account(owner)?;
        Ok(self.engine.notifier().watch_orders(owner, observer))
    }

    /// Channel receiving a [`Message::OrderStatus`] for every transition of
    /// `owner`'s orders
    pub fn watch_orders_channel(&self, owner: AccountId) -> Result<(SubscriptionId, Receiver<Message>)> {
        self.accounts.get_account(owner)?;
        Ok(self.engine.notifier().subscribe(Topic::Orders(owner)))
    }

    /// Drop a channel subscription
    pub fn unsubscribe_channel(&self, subscription: SubscriptionId) -> bool {
        self.engine.notifier().unsubscribe(subscription)
    }
}
