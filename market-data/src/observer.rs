//! Synchronous observer traits
//!
//! Observers are called on the publishing thread, in publication order,
//! while the instrument's matching loop is paused between trades. They
//! should return quickly and must not submit or cancel orders on the same
//! instrument.

use common::model::event::{OrderStatusEvent, TradeEvent};

/// Receives every trade on an instrument
pub trait PriceObserver: Send + Sync {
    fn on_trade(&self, event: &TradeEvent);
}

/// Receives status transitions of an owner's orders
pub trait OrderObserver: Send + Sync {
    fn on_status(&self, event: &OrderStatusEvent);
}

impl<F> PriceObserver for F
where
    F: Fn(&TradeEvent) + Send + Sync,
{
    fn on_trade(&self, event: &TradeEvent) {
        self(event)
    }
}

impl<F> OrderObserver for F
where
    F: Fn(&OrderStatusEvent) + Send + Sync,
{
    fn on_status(&self, event: &OrderStatusEvent) {
        self(event)
    }
}
