use std::sync::{Arc, Mutex};

use common::decimal::dec;
use common::error::Error;
use common::model::account::Balance;
use common::model::event::OrderStatusEvent;
use common::model::order::{OrderType, Side, Status};
use common::AccountId;
use market_data::Message;
use matching_engine::EngineConfig;
use trading_engine::simulation::{self, SimulationParams};
use trading_engine::{Exchange, ExchangeConfig};

fn exchange() -> Exchange {
    Exchange::from_config(&ExchangeConfig::default()).unwrap()
}

#[test]
fn test_place_and_cancel_through_the_facade() {
    let exchange = exchange();
    let alice = exchange.register_participant("Alice", dec!(20000)).unwrap();
    let bob = exchange.register_participant("Bob", dec!(25000)).unwrap();
    exchange.deposit_shares(bob, "aapl", 50).unwrap();

    let buy = exchange
        .place_order(alice, "AAPL", Side::Buy, OrderType::Limit, 10, Some(dec!(150.50)))
        .unwrap();
    let sell = exchange
        .place_order(bob, "AAPL", Side::Sell, OrderType::Limit, 20, Some(dec!(150.50)))
        .unwrap();

    assert_eq!(exchange.get_order_status(buy).unwrap(), Status::Filled);
    assert_eq!(exchange.get_order_status(sell).unwrap(), Status::PartiallyFilled);
    assert!(matches!(exchange.cancel_order(buy), Err(Error::AlreadyTerminal(_))));
    exchange.cancel_order(sell).unwrap();

    let bob_balance = exchange.get_balance(bob).unwrap();
    assert_eq!(bob_balance.cash, Balance::new(dec!(26505.00)));
    assert_eq!(bob_balance.holding("AAPL"), Balance::new(40));
    assert_eq!(exchange.orders_for(bob).unwrap().len(), 1);
    assert_eq!(exchange.last_price("AAPL").unwrap(), dec!(150.50));
}

#[test]
fn test_invalid_orders_are_rejected_before_reservation() {
    let exchange = exchange();
    let alice = exchange.register_participant("Alice", dec!(1000)).unwrap();

    let err = exchange
        .place_order(alice, "AAPL", Side::Buy, OrderType::Limit, 0, Some(dec!(1)))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOrder(_)));
    let err = exchange
        .place_order(alice, "AAPL", Side::Buy, OrderType::Limit, 1, None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOrder(_)));
    let err = exchange
        .place_order(alice, "AAPL", Side::Buy, OrderType::Limit, 1, Some(dec!(-1)))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOrder(_)));

    assert_eq!(exchange.get_balance(alice).unwrap().cash, Balance::new(dec!(1000)));
    assert!(matches!(exchange.orders_for(AccountId::new()), Err(Error::AccountNotFound(_))));
}

#[test]
fn test_participant_funds() {
    let exchange = exchange();
    let carol = exchange.register_participant("Carol", dec!(100)).unwrap();
    exchange.deposit_cash(carol, dec!(50)).unwrap();
    assert!(matches!(exchange.withdraw_cash(carol, dec!(151)), Err(Error::InsufficientFunds(_))));
    exchange.withdraw_cash(carol, dec!(150)).unwrap();

    assert!(matches!(exchange.deposit_shares(carol, "MSFT", 1), Err(Error::InstrumentNotFound(_))));
    exchange.deposit_shares(carol, "GOOG", 2).unwrap();
    assert!(matches!(exchange.withdraw_shares(carol, "GOOG", 3), Err(Error::InsufficientHoldings(_))));
    let balance = exchange.withdraw_shares(carol, "GOOG", 2).unwrap();
    assert_eq!(balance.cash.total(), dec!(0));
    assert!(balance.holdings.is_empty());
}

#[test]
fn test_subscriptions() {
    let exchange = exchange();
    let alice = exchange.register_participant("Alice", dec!(20000)).unwrap();
    let bob = exchange.register_participant("Bob", dec!(0)).unwrap();
    exchange.deposit_shares(bob, "AAPL", 5).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = exchange
        .subscribe_price("aapl", move |event| sink.lock().unwrap().push(event.quantity))
        .unwrap();
    let (_, trades) = exchange.subscribe_price_channel("AAPL").unwrap();
    let (_, statuses) = exchange.watch_orders_channel(alice).unwrap();
    let watched = Arc::new(Mutex::new(Vec::new()));
    let sink = watched.clone();
    exchange
        .watch_orders(bob, Arc::new(move |event: &OrderStatusEvent| sink.lock().unwrap().push(event.status)))
        .unwrap();

    exchange.place_order(bob, "AAPL", Side::Sell, OrderType::Limit, 2, Some(dec!(150))).unwrap();
    exchange.place_order(alice, "AAPL", Side::Buy, OrderType::Market, 2, None).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![2]);
    assert!(matches!(trades.try_recv(), Ok(Message::Trade(_))));
    let alice_statuses: Vec<Status> = statuses
        .try_iter()
        .filter_map(|message| match message {
            Message::OrderStatus(event) => Some(event.status),
            Message::Trade(_) => None,
        })
        .collect();
    assert_eq!(alice_statuses, vec![Status::Open, Status::Filled]);
    assert_eq!(*watched.lock().unwrap(), vec![Status::Open, Status::Filled]);

    assert!(exchange.unsubscribe_price("AAPL", subscription).unwrap());
    assert!(matches!(exchange.subscribe_price_channel("MSFT"), Err(Error::InstrumentNotFound(_))));
    assert!(matches!(
        exchange.watch_orders_channel(AccountId::new()),
        Err(Error::AccountNotFound(_))
    ));
}

#[test]
fn test_duplicate_configured_instrument_fails() {
    let config = ExchangeConfig::new(
        vec![("AAPL".to_string(), dec!(1)), ("aapl".to_string(), dec!(2))],
        EngineConfig::default(),
    );
    assert!(matches!(Exchange::from_config(&config), Err(Error::DuplicateInstrument(_))));
}

#[tokio::test]
async fn test_simulation_conserves_cash_and_shares() {
    let exchange = Arc::new(exchange());
    let params = SimulationParams {
        traders: 6,
        orders_per_trader: 150,
        ..SimulationParams::default()
    };
    let report = simulation::run(exchange.clone(), params).await.unwrap();

    assert!(report.is_conserved());
    assert_eq!(report.submitted, 900);
    assert_eq!(report.accepted + report.rejected, report.submitted);
    assert!(report.trades > 0);
    if let (Some(bid), Some(ask)) = (report.depth.best_bid(), report.depth.best_ask()) {
        assert!(bid < ask);
    }
}

#[tokio::test]
async fn test_simulation_rejects_bad_ratios() {
    let params = SimulationParams {
        cancel_ratio: 1.5,
        ..SimulationParams::default()
    };
    let err = simulation::run(Arc::new(exchange()), params).await.unwrap_err();
    assert!(matches!(err, Error::ValidationError(_)));
}
