//! Scripted brokerage walkthrough used by `trading-engine demo`

use std::sync::{Arc, Mutex, PoisonError};

use common::decimal::{dec, Price};
use common::error::{Error, Result};
use common::model::account::AccountBalance;
use common::model::event::{OrderStatusEvent, TradeEvent};
use common::model::order::{OrderType, Side};
use common::AccountId;
use serde::Serialize;

use crate::exchange::Exchange;

/// Account state after one scenario step
#[derive(Debug, Clone, Serialize)]
pub struct DemoStep {
    pub title: String,
    /// Notifications and outcomes observed during the step
    pub events: Vec<String>,
    pub balances: Vec<AccountBalance>,
}

type EventLog = Arc<Mutex<Vec<String>>>;

struct Demo<'a> {
    exchange: &'a Exchange,
    participants: Vec<AccountId>,
    log: EventLog,
    steps: Vec<DemoStep>,
}

impl Demo<'_> {
    fn note(&self, event: String) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    fn step(&mut self, title: &str) -> Result<()> {
        let events = std::mem::take(&mut *self.log.lock().unwrap_or_else(PoisonError::into_inner));
        let balances = self
            .participants
            .iter()
            .map(|id| self.exchange.get_balance(*id))
            .collect::<Result<Vec<_>>>()?;
        self.steps.push(DemoStep {
            title: title.to_string(),
            events,
            balances,
        });
        Ok(())
    }
}

fn ensure_listed(exchange: &Exchange, symbol: &str, price: Price) -> Result<()> {
    match exchange.last_price(symbol) {
        Ok(_) => Ok(()),
        Err(Error::InstrumentNotFound(_)) => exchange.list_instrument(symbol, price).map(|_| ()),
        Err(e) => Err(e),
    }
}

/// Replay the walkthrough: a matching limit pair, a cancelled resting order
/// and a cancel attempt on a filled order
pub fn run(exchange: &Exchange) -> Result<Vec<DemoStep>> {
    ensure_listed(exchange, "AAPL", dec!(150.00))?;
    ensure_listed(exchange, "GOOG", dec!(2800.00))?;

    let alice = exchange.register_participant("Alice", dec!(20000.00))?;
    let bob = exchange.register_participant("Bob", dec!(25000.00))?;
    exchange.deposit_shares(bob, "AAPL", 50)?;

    let mut demo = Demo {
        exchange,
        participants: vec![alice, bob],
        log: Arc::new(Mutex::new(Vec::new())),
        steps: Vec::new(),
    };

    for (name, symbols) in [("Alice", &["AAPL", "GOOG"][..]), ("Bob", &["AAPL"][..])] {
        for symbol in symbols {
            let log = demo.log.clone();
            exchange.subscribe_price(symbol, move |event: &TradeEvent| {
                log.lock().unwrap_or_else(PoisonError::into_inner).push(format!(
                    "{} notified: {} traded {} @ {}",
                    name, event.symbol, event.quantity, event.price
                ));
            })?;
        }
    }
    for (name, owner) in [("Alice", alice), ("Bob", bob)] {
        let log = demo.log.clone();
        exchange.watch_orders(
            owner,
            Arc::new(move |event: &OrderStatusEvent| {
                log.lock().unwrap_or_else(PoisonError::into_inner).push(format!(
                    "{}'s {} order {} is {} ({} remaining)",
                    name, event.symbol, event.order_id, event.status, event.remaining_quantity
                ));
            }),
        )?;
    }
    demo.step("Initial state")?;

    let alice_buy = exchange.place_order(alice, "AAPL", Side::Buy, OrderType::Limit, 10, Some(dec!(150.50)))?;
    let bob_sell = exchange.place_order(bob, "AAPL", Side::Sell, OrderType::Limit, 20, Some(dec!(150.50)))?;
    demo.step("Alice buys 10 AAPL at 150.50 or less, Bob sells 20 AAPL at 150.50 or more")?;

    let goog_buy = exchange.place_order(alice, "GOOG", Side::Buy, OrderType::Limit, 5, Some(dec!(2700.00)))?;
    demo.note(format!("Status before cancellation: {}", exchange.get_order_status(goog_buy)?));
    exchange.cancel_order(goog_buy)?;
    demo.note(format!("Status after cancellation: {}", exchange.get_order_status(goog_buy)?));
    demo.step("Alice places a GOOG buy below the market and cancels it")?;

    match exchange.cancel_order(alice_buy) {
        Err(e @ Error::AlreadyTerminal(_)) => demo.note(format!("Cancel rejected: {}", e)),
        Err(e) => return Err(e),
        Ok(()) => demo.note("Cancel unexpectedly succeeded".to_string()),
    }
    demo.note(format!(
        "Bob's sell is {} with {} remaining",
        exchange.get_order_status(bob_sell)?,
        exchange.order_details(bob_sell)?.remaining_quantity()
    ));
    exchange.cancel_order(bob_sell)?;
    demo.step("Cancel attempts on Alice's filled buy and Bob's partially filled sell")?;

    Ok(demo.steps)
}
