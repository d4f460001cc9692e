//! Tradable instrument with its last trade price and price subscribers

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::decimal::{Price, Quantity};
use common::error::{Error, Result};
use common::model::event::TradeEvent;
use common::SubscriptionId;
use tracing::debug;

use crate::observer::PriceObserver;

struct InstrumentState {
    last_price: Price,
    volume: Quantity,
    trade_count: u64,
    subscribers: Vec<(SubscriptionId, Arc<dyn PriceObserver>)>,
}

/// A listed symbol.
///
/// The last trade price starts at the listing price and only changes when
/// a trade on this instrument is recorded.
pub struct Instrument {
    symbol: String,
    state: Mutex<InstrumentState>,
}

impl Instrument {
    /// Create an instrument listed at `initial_price`
    pub fn new(symbol: &str, initial_price: Price) -> Result<Self> {
        let symbol = normalize_symbol(symbol)?;
        if initial_price < Price::ZERO {
            return Err(Error::ValidationError(format!(
                "listing price for {} must not be negative: {}",
                symbol, initial_price
            )));
        }
        Ok(Self {
            symbol,
            state: Mutex::new(InstrumentState {
                last_price: initial_price,
                volume: 0,
                trade_count: 0,
                subscribers: Vec::new(),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, InstrumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Price of the most recent trade
    pub fn last_price(&self) -> Price {
        self.state().last_price
    }

    /// Total shares traded
    pub fn volume(&self) -> Quantity {
        self.state().volume
    }

    pub fn trade_count(&self) -> u64 {
        self.state().trade_count
    }

    /// Register a price observer
    pub fn subscribe(&self, observer: Arc<dyn PriceObserver>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.state().subscribers.push((id, observer));
        debug!("Subscription {} added on {}", id, self.symbol);
        id
    }

    /// Remove a price observer; false if the id is unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sub_id, _)| *sub_id != id);
        state.subscribers.len() < before
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Record a trade and deliver it to every subscriber, in subscription
    /// order.
    ///
    /// Observers run after the instrument lock is released so they may read
    /// the instrument back.
    pub fn record_trade(&self, event: &TradeEvent) {
        let subscribers: Vec<Arc<dyn PriceObserver>> = {
            let mut state = self.state();
            state.last_price = event.price;
            state.volume += event.quantity;
            state.trade_count += 1;
            state.subscribers.iter().map(|(_, observer)| observer.clone()).collect()
        };
        for observer in subscribers {
            observer.on_trade(event);
        }
    }
}

/// Upper-case a symbol and check it is a plausible ticker
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    let valid = !symbol.is_empty()
        && symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid {
        return Err(Error::ValidationError(format!("invalid instrument symbol: {:?}", symbol)));
    }
    Ok(symbol)
}
