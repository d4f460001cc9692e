//! Notification fan-out for trades and order status transitions

use std::sync::Arc;

use common::model::event::{OrderStatusEvent, TradeEvent};
use common::model::order::Order;
use common::model::trade::Trade;
use common::{AccountId, SubscriptionId};
use crossbeam_channel::Receiver;
use dashmap::DashMap;
use tracing::debug;

use crate::channel::{MarketDataChannel, Message, Topic};
use crate::instrument::Instrument;
use crate::observer::OrderObserver;

/// Delivers trade events to instrument subscribers and status events to
/// order owners, synchronously and in publication order.
#[derive(Default)]
pub struct NotificationHub {
    /// Status observers by order owner
    owners: DashMap<AccountId, Vec<(SubscriptionId, Arc<dyn OrderObserver>)>>,
    /// Channel subscribers
    channel: MarketDataChannel,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for every status transition of `owner`'s orders
    pub fn watch_orders(&self, owner: AccountId, observer: Arc<dyn OrderObserver>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.owners.entry(owner).or_default().push((id, observer));
        id
    }

    /// Remove an owner observer; false if the id is unknown
    pub fn unwatch_orders(&self, owner: AccountId, id: SubscriptionId) -> bool {
        self.owners.get_mut(&owner).map_or(false, |mut observers| {
            let before = observers.len();
            observers.retain(|(sub_id, _)| *sub_id != id);
            observers.len() < before
        })
    }

    /// Subscribe a channel to a topic
    pub fn subscribe(&self, topic: Topic) -> (SubscriptionId, Receiver<Message>) {
        self.channel.subscribe(topic)
    }

    /// Remove a channel subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.channel.unsubscribe(id)
    }

    pub fn channel(&self) -> &MarketDataChannel {
        &self.channel
    }

    /// Publish a completed trade: updates the instrument's last price,
    /// then notifies its observers and channel subscribers.
    pub fn publish_trade(&self, instrument: &Instrument, trade: &Trade) -> TradeEvent {
        let event = TradeEvent::from(trade);
        instrument.record_trade(&event);
        self.channel.publish(Topic::Trades(event.symbol.clone()), Message::Trade(event.clone()));
        debug!("Published trade {} on {}", event.trade_id, event.symbol);
        event
    }

    /// Publish the current status of `order` to its owner
    pub fn publish_status(&self, order: &Order) -> OrderStatusEvent {
        let event = OrderStatusEvent::from(order);
        // Clone the observer list so no map shard is locked during callbacks
        let observers: Vec<Arc<dyn OrderObserver>> = self
            .owners
            .get(&event.owner)
            .map(|entry| entry.iter().map(|(_, observer)| observer.clone()).collect())
            .unwrap_or_default();
        for observer in observers {
            observer.on_status(&event);
        }
        self.channel.publish(Topic::Orders(event.owner), Message::OrderStatus(event.clone()));
        event
    }
}
