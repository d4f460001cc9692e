
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use anyhow::Result;
use rust_decimal_macros::dec;
use stock_exchange::common::decimal::{Price, Quantity};
use stock_exchange::common::error::Error;
use stock_exchange::common::model::account::Balance;
use stock_exchange::common::model::order::{Order, OrderBuilder, Side, Status};
use stock_exchange::common::AccountId;
use stock_exchange::Exchange;
use test_helpers::{exchange, limit, market, participant, totals};

#[test]
fn test_limit_orders_trade_and_leave_remainder_resting() -> Result<()> {
    let exchange = exchange()?;
    let alice = participant(&exchange, "Alice", dec!(20000), 0)?;
    let bob = participant(&exchange, "Bob", dec!(25000), 50)?;

    let buy = limit(&exchange, alice, Side::Buy, 10, dec!(150.50))?;
    let sell = limit(&exchange, bob, Side::Sell, 20, dec!(150.50))?;

    assert_eq!(exchange.get_order_status(buy)?, Status::Filled);
    let sell = exchange.order_details(sell)?;
    assert_eq!(sell.status(), Status::PartiallyFilled);
    assert_eq!(sell.remaining_quantity(), 10);
    assert_eq!(sell.filled_quantity(), 10);

    let depth = exchange.depth("AAPL", 10)?;
    assert_eq!(depth.asks.len(), 1);
    assert_eq!(depth.asks[0].quantity, 10);
    assert_eq!(depth.last_price, dec!(150.50));

    assert_eq!(exchange.get_balance(alice)?.cash.total(), dec!(18495.00));
    assert_eq!(exchange.get_balance(bob)?.cash.total(), dec!(26505.00));
    Ok(())
}

#[test]
fn test_cancel_releases_reservation_and_terminal_cancel_is_rejected() -> Result<()> {
    let exchange = exchange()?;
    let alice = participant(&exchange, "Alice", dec!(1000), 0)?;
    let bob = participant(&exchange, "Bob", dec!(0), 5)?;

    let resting = limit(&exchange, alice, Side::Buy, 5, dec!(100))?;
    assert_eq!(exchange.get_balance(alice)?.cash.reserved, dec!(500));
    exchange.cancel_order(resting)?;
    assert_eq!(exchange.get_balance(alice)?.cash, Balance::new(dec!(1000)));

    let filled = limit(&exchange, alice, Side::Buy, 5, dec!(100))?;
    market(&exchange, bob, Side::Sell, 5)?;
    assert_eq!(exchange.get_order_status(filled)?, Status::Filled);

    let before = (exchange.get_balance(alice)?, exchange.get_balance(bob)?);
    assert!(matches!(exchange.cancel_order(filled), Err(Error::AlreadyTerminal(_))));
    assert!(matches!(exchange.cancel_order(resting), Err(Error::AlreadyTerminal(_))));
    let after = (exchange.get_balance(alice)?, exchange.get_balance(bob)?);
    assert_eq!((before.0.cash, before.1.cash), (after.0.cash, after.1.cash));
    assert_eq!(after.0.holding("AAPL"), Balance::new(5));
    Ok(())
}

#[test]
fn test_market_buy_fills_at_resting_price() -> Result<()> {
    let exchange = exchange()?;
    let seller = participant(&exchange, "Seller", dec!(0), 5)?;
    let buyer = participant(&exchange, "Buyer", dec!(1000), 0)?;

    let sell = limit(&exchange, seller, Side::Sell, 5, dec!(149.25))?;
    let buy = market(&exchange, buyer, Side::Buy, 5)?;

    assert_eq!(exchange.get_order_status(sell)?, Status::Filled);
    assert_eq!(exchange.get_order_status(buy)?, Status::Filled);
    assert_eq!(exchange.order_details(buy)?.average_fill_price(), Some(dec!(149.25)));
    assert_eq!(exchange.get_balance(buyer)?.cash, Balance::new(dec!(253.75)));
    assert_eq!(exchange.last_price("AAPL")?, dec!(149.25));
    Ok(())
}

#[test]
fn test_trades_reach_subscribers_in_execution_order() -> Result<()> {
    let exchange = exchange()?;
    let seller = participant(&exchange, "Seller", dec!(0), 30)?;
    let buyer = participant(&exchange, "Buyer", dec!(100000), 0)?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    exchange.subscribe_price("AAPL", move |event| {
        sink.lock().unwrap().push((event.price, event.quantity));
    })?;

    limit(&exchange, seller, Side::Sell, 5, dec!(151))?;
    limit(&exchange, seller, Side::Sell, 5, dec!(150))?;
    limit(&exchange, seller, Side::Sell, 5, dec!(150))?;
    limit(&exchange, buyer, Side::Buy, 12, dec!(151))?;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(dec!(150), 5), (dec!(150), 5), (dec!(151), 2)]
    );
    Ok(())
}

type Intent = (usize, Side, Quantity, Option<Price>);

fn build(owner: AccountId, intent: &Intent) -> Order {
    let (_, side, quantity, price) = *intent;
    let builder = OrderBuilder::new().for_owner(owner).with_symbol("AAPL").side(side, quantity);
    let builder = match price {
        Some(price) => builder.with_limit(price),
        None => builder.at_market_price(),
    };
    builder.build().unwrap()
}

fn traders(exchange: &Exchange, count: usize) -> Result<Vec<AccountId>> {
    (0..count)
        .map(|i| participant(exchange, &format!("trader-{}", i), dec!(50000), 100))
        .collect()
}

fn intents() -> Vec<Intent> {
    let mut intents = Vec::new();
    for i in 0..48usize {
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let quantity = (i as u64 % 7) + 1;
        let price = if i % 11 == 5 {
            None
        } else {
            Some(dec!(148) + Price::from(i as u64 % 5))
        };
        intents.push((i % 6, side, quantity, price));
    }
    intents
}

#[test]
fn test_concurrent_submissions_equal_sequential_replay() -> Result<()> {
    let intents = intents();

    let concurrent = Arc::new(exchange()?);
    let accounts = traders(&concurrent, 6)?;
    let trades = Arc::new(Mutex::new(Vec::new()));
    let sink = trades.clone();
    concurrent.subscribe_price("AAPL", move |event| sink.lock().unwrap().push((event.price, event.quantity)))?;

    let barrier = Arc::new(Barrier::new(intents.len()));
    let handles: Vec<_> = intents
        .iter()
        .map(|intent| {
            let exchange = concurrent.clone();
            let barrier = barrier.clone();
            let order = build(accounts[intent.0], intent);
            thread::spawn(move || {
                barrier.wait();
                exchange.submit(order).map(|result| result.order.sequence())
            })
        })
        .collect();
    let mut arrival: Vec<(u64, usize)> = Vec::new();
    for (index, handle) in handles.into_iter().enumerate() {
        let sequence = handle.join().map_err(|_| anyhow::anyhow!("submitter panicked"))??;
        arrival.push((sequence, index));
    }
    arrival.sort();

    let sequential = exchange()?;
    let replay_accounts = traders(&sequential, 6)?;
    let replay_trades = Arc::new(Mutex::new(Vec::new()));
    let sink = replay_trades.clone();
    sequential.subscribe_price("AAPL", move |event| sink.lock().unwrap().push((event.price, event.quantity)))?;
    for (_, index) in &arrival {
        let intent = &intents[*index];
        sequential.submit(build(replay_accounts[intent.0], intent))?;
    }

    assert_eq!(*trades.lock().unwrap(), *replay_trades.lock().unwrap());
    assert_eq!(concurrent.depth("AAPL", 100)?.bids, sequential.depth("AAPL", 100)?.bids);
    assert_eq!(concurrent.depth("AAPL", 100)?.asks, sequential.depth("AAPL", 100)?.asks);
    for (left, right) in accounts.iter().zip(&replay_accounts) {
        let (left, right) = (concurrent.get_balance(*left)?, sequential.get_balance(*right)?);
        assert_eq!(left.cash, right.cash);
        assert_eq!(left.holdings, right.holdings);
    }
    Ok(())
}

#[test]
fn test_cancel_racing_a_fill_settles_exactly_once() -> Result<()> {
    for _ in 0..50 {
        let exchange = Arc::new(exchange()?);
        let seller = participant(&exchange, "Seller", dec!(0), 10)?;
        let buyer = participant(&exchange, "Buyer", dec!(10000), 0)?;
        let sell = limit(&exchange, seller, Side::Sell, 10, dec!(150))?;

        let barrier = Arc::new(Barrier::new(2));
        let canceller = {
            let exchange = exchange.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                exchange.cancel_order(sell)
            })
        };
        let buy = {
            let exchange = exchange.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                limit(&exchange, buyer, Side::Buy, 10, dec!(150))
            })
        };
        let cancelled = canceller.join().map_err(|_| anyhow::anyhow!("canceller panicked"))?;
        let buy = buy.join().map_err(|_| anyhow::anyhow!("buyer panicked"))??;

        match cancelled {
            Ok(()) => {
                assert_eq!(exchange.get_order_status(sell)?, Status::Cancelled);
                assert_eq!(exchange.get_order_status(buy)?, Status::Open);
                assert_eq!(exchange.get_balance(seller)?.holding("AAPL"), Balance::new(10));
            }
            Err(Error::AlreadyTerminal(_)) => {
                assert_eq!(exchange.get_order_status(sell)?, Status::Filled);
                assert_eq!(exchange.get_balance(buyer)?.holding("AAPL"), Balance::new(10));
            }
            Err(e) => return Err(e.into()),
        }
        assert_eq!(totals(&exchange, &[seller, buyer])?, (dec!(10000), 10));
    }
    Ok(())
}

#[test]
fn test_instruments_match_in_parallel() -> Result<()> {
    let exchange = Arc::new(exchange()?);
    let mut accounts = Vec::new();
    let mut handles = Vec::new();
    for symbol in ["AAPL", "GOOG"] {
        let seller = exchange.register_participant(&format!("{}-seller", symbol), dec!(0))?;
        let buyer = exchange.register_participant(&format!("{}-buyer", symbol), dec!(1000000))?;
        exchange.deposit_shares(seller, symbol, 200)?;
        accounts.push((symbol, seller, buyer));
        for owner in [seller, buyer] {
            let exchange = exchange.clone();
            handles.push(thread::spawn(move || -> Result<()> {
                let side = if owner == seller { Side::Sell } else { Side::Buy };
                for _ in 0..100 {
                    let order = OrderBuilder::new()
                        .for_owner(owner)
                        .with_symbol(symbol)
                        .side(side, 2)
                        .with_limit(dec!(100))
                        .build()?;
                    exchange.submit(order)?;
                }
                Ok(())
            }));
        }
    }
    for handle in handles {
        handle.join().map_err(|_| anyhow::anyhow!("trader panicked"))??;
    }

    for (symbol, seller, buyer) in accounts {
        assert!(exchange.depth(symbol, 10)?.is_empty());
        assert_eq!(exchange.get_balance(seller)?.cash, Balance::new(dec!(20000)));
        assert_eq!(exchange.get_balance(buyer)?.holding(symbol), Balance::new(200));
        assert_eq!(exchange.last_price(symbol)?, dec!(100));
    }
    Ok(())
}
