#![allow(dead_code)]

use std::sync::Arc;

use account_service::AccountService;
use common::decimal::{dec, Amount, Price, Quantity};
use common::model::order::{Order, OrderBuilder, Side};
use common::AccountId;
use market_data::{InstrumentRegistry, NotificationHub};
use matching_engine::{EngineConfig, MatchingEngine};

pub struct Market {
    pub engine: MatchingEngine,
    pub accounts: AccountService,
}

impl Market {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let accounts = AccountService::new();
        let engine = MatchingEngine::new(
            accounts.registry(),
            Arc::new(InstrumentRegistry::new()),
            Arc::new(NotificationHub::new()),
            config,
        );
        engine.list_instrument("AAPL", dec!(150)).unwrap();
        engine.list_instrument("GOOG", dec!(2800)).unwrap();
        Self { engine, accounts }
    }

    pub fn trader(&self, name: &str, cash: Amount, shares: Quantity) -> AccountId {
        let account = self.accounts.open_account(name, cash).unwrap();
        if shares > 0 {
            self.accounts.deposit_shares(account.id(), "AAPL", shares).unwrap();
        }
        account.id()
    }
}

pub fn limit(owner: AccountId, side: Side, quantity: Quantity, price: Price) -> Order {
    OrderBuilder::new()
        .for_owner(owner)
        .with_symbol("AAPL")
        .side(side, quantity)
        .with_limit(price)
        .build()
        .unwrap()
}

pub fn market(owner: AccountId, side: Side, quantity: Quantity) -> Order {
    OrderBuilder::new()
        .for_owner(owner)
        .with_symbol("AAPL")
        .side(side, quantity)
        .at_market_price()
        .build()
        .unwrap()
}
