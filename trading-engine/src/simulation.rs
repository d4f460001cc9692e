//! Concurrent trading simulation
//!
//! Every simulated trader runs on its own blocking task and submits seeded
//! random orders against one instrument, so runs are reproducible per
//! trader while the interleaving across traders is left to the scheduler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::decimal::{dec, Amount, Price, Quantity};
use common::error::{Error, IntoError, Result};
use common::model::market::MarketDepth;
use common::model::order::{OrderType, Side};
use common::{AccountId, OrderId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::exchange::Exchange;

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub traders: usize,
    pub orders_per_trader: usize,
    pub symbol: String,
    pub seed: u64,
    /// Starting cash of every trader
    pub initial_cash: Amount,
    /// Starting shares of every trader
    pub initial_shares: Quantity,
    /// Share of submissions that are market orders
    pub market_order_ratio: f64,
    /// Share of submissions followed by a cancel of an earlier order
    pub cancel_ratio: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            traders: 8,
            orders_per_trader: 200,
            symbol: "AAPL".to_string(),
            seed: 42,
            initial_cash: dec!(1000000),
            initial_shares: 1000,
            market_order_ratio: 0.1,
            cancel_ratio: 0.2,
        }
    }
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub symbol: String,
    pub traders: usize,
    pub submitted: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub trades: u64,
    pub volume: Quantity,
    pub last_price: Price,
    pub cash_before: Amount,
    pub cash_after: Amount,
    pub shares_before: Quantity,
    pub shares_after: Quantity,
    pub depth: MarketDepth,
}

impl SimulationReport {
    /// Whether no cash or shares were created or destroyed
    pub fn is_conserved(&self) -> bool {
        self.cash_before == self.cash_after && self.shares_before == self.shares_after
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    cancelled: AtomicU64,
}

/// Run the simulation to completion
pub async fn run(exchange: Arc<Exchange>, params: SimulationParams) -> Result<SimulationReport> {
    for (name, ratio) in [("market order ratio", params.market_order_ratio), ("cancel ratio", params.cancel_ratio)] {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(Error::ValidationError(format!("{} must be within 0..=1, got {}", name, ratio)));
        }
    }
    let symbol = exchange.engine().instruments().get_instrument(&params.symbol)?.symbol().to_string();
    let mut traders = Vec::with_capacity(params.traders);
    for i in 0..params.traders {
        let id = exchange.register_participant(&format!("trader-{}", i), params.initial_cash)?;
        if params.initial_shares > 0 {
            exchange.deposit_shares(id, &symbol, params.initial_shares)?;
        }
        traders.push(id);
    }
    let (cash_before, shares_before) = totals(&exchange, &traders, &symbol)?;

    let trades = Arc::new(AtomicU64::new(0));
    let volume = Arc::new(AtomicU64::new(0));
    let subscription = {
        let trades = trades.clone();
        let volume = volume.clone();
        exchange.subscribe_price(&symbol, move |event| {
            trades.fetch_add(1, Ordering::Relaxed);
            volume.fetch_add(event.quantity, Ordering::Relaxed);
        })?
    };

    info!(
        "Simulating {} traders x {} orders on {}",
        params.traders, params.orders_per_trader, symbol
    );
    let counters = Arc::new(Counters::default());
    let handles: Vec<_> = traders
        .iter()
        .enumerate()
        .map(|(i, owner)| {
            let exchange = exchange.clone();
            let counters = counters.clone();
            let params = params.clone();
            let symbol = symbol.clone();
            let owner = *owner;
            tokio::task::spawn_blocking(move || {
                trade_randomly(&exchange, &counters, &params, &symbol, owner, params.seed.wrapping_add(i as u64))
            })
        })
        .collect();
    for handle in handles {
        handle.await.map_err(|e| e.into_error("simulated trader failed"))?;
    }
    exchange.unsubscribe_price(&symbol, subscription)?;

    let (cash_after, shares_after) = totals(&exchange, &traders, &symbol)?;
    let report = SimulationReport {
        symbol: symbol.clone(),
        traders: params.traders,
        submitted: counters.submitted.load(Ordering::Relaxed),
        accepted: counters.accepted.load(Ordering::Relaxed),
        rejected: counters.rejected.load(Ordering::Relaxed),
        cancelled: counters.cancelled.load(Ordering::Relaxed),
        trades: trades.load(Ordering::Relaxed),
        volume: volume.load(Ordering::Relaxed),
        last_price: exchange.last_price(&symbol)?,
        cash_before,
        cash_after,
        shares_before,
        shares_after,
        depth: exchange.depth(&symbol, 5)?,
    };
    info!(
        "Simulation finished: {} trades, {} shares, conserved: {}",
        report.trades,
        report.volume,
        report.is_conserved()
    );
    Ok(report)
}

fn trade_randomly(
    exchange: &Exchange,
    counters: &Counters,
    params: &SimulationParams,
    symbol: &str,
    owner: AccountId,
    seed: u64,
) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut placed: Vec<OrderId> = Vec::new();
    for _ in 0..params.orders_per_trader {
        let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let quantity = rng.gen_range(1..=50);
        let (kind, limit_price) = if rng.gen_bool(params.market_order_ratio) {
            (OrderType::Market, None)
        } else {
            // Within 2% of the last trade, rounded to cents
            let last = exchange.last_price(symbol).unwrap_or_default();
            let bps = rng.gen_range(-200i64..=200);
            let price = (last * Decimal::from(10_000 + bps) / Decimal::from(10_000)).round_dp(2);
            (OrderType::Limit, Some(price))
        };

        counters.submitted.fetch_add(1, Ordering::Relaxed);
        match exchange.place_order(owner, symbol, side, kind, quantity, limit_price) {
            Ok(id) => {
                counters.accepted.fetch_add(1, Ordering::Relaxed);
                placed.push(id);
            }
            Err(e) => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!("Trader {} order rejected: {}", owner, e);
            }
        }

        if !placed.is_empty() && rng.gen_bool(params.cancel_ratio) {
            let id = placed.swap_remove(rng.gen_range(0..placed.len()));
            if exchange.cancel_order(id).is_ok() {
                counters.cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn totals(exchange: &Exchange, traders: &[AccountId], symbol: &str) -> Result<(Amount, Quantity)> {
    let mut cash = Amount::ZERO;
    let mut shares = 0;
    for trader in traders {
        let balance = exchange.get_balance(*trader)?;
        cash += balance.cash.total();
        shares += balance.holding(symbol).total();
    }
    Ok((cash, shares))
}
