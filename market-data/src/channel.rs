//! Channel for market data distribution

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use common::model::event::{OrderStatusEvent, TradeEvent};
use common::{AccountId, SubscriptionId};
use crossbeam_channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Topic types for market data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Trades for one instrument
    Trades(String),
    /// Status transitions of one owner's orders
    Orders(AccountId),
    /// All trades
    AllTrades,
    /// All order status transitions
    AllOrders,
}

/// Message delivered to channel subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Trade(TradeEvent),
    OrderStatus(OrderStatusEvent),
}

/// Subscription entry
struct SubscriptionEntry {
    /// Sender channel
    sender: Sender<Message>,
    /// Subscription ID
    id: SubscriptionId,
}

/// Market data channel
///
/// Subscribers get an unbounded crossbeam receiver, so publishing never
/// blocks and each receiver sees messages in publication order.
#[derive(Default)]
pub struct MarketDataChannel {
    /// Senders by topic
    senders: Mutex<HashMap<Topic, Vec<SubscriptionEntry>>>,
}

impl MarketDataChannel {
    /// Create a new market data channel
    pub fn new() -> Self {
        Self::default()
    }

    fn senders(&self) -> MutexGuard<'_, HashMap<Topic, Vec<SubscriptionEntry>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to a topic
    pub fn subscribe(&self, topic: Topic) -> (SubscriptionId, Receiver<Message>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let id = SubscriptionId::new();
        self.senders().entry(topic).or_default().push(SubscriptionEntry { sender, id });
        (id, receiver)
    }

    /// Publish to a topic and to the matching "all" topic
    pub fn publish(&self, topic: Topic, message: Message) {
        let mut senders = self.senders();
        let wildcard = match &topic {
            Topic::Trades(_) => Some(Topic::AllTrades),
            Topic::Orders(_) => Some(Topic::AllOrders),
            Topic::AllTrades | Topic::AllOrders => None,
        };
        for topic in std::iter::once(topic).chain(wildcard) {
            if let Some(entries) = senders.get_mut(&topic) {
                // Dropped receivers are pruned on the next publish
                entries.retain(|entry| entry.sender.send(message.clone()).is_ok());
            }
        }
    }

    /// Unsubscribe using subscription ID
    pub fn unsubscribe(&self, subscription_id: SubscriptionId) -> bool {
        let mut found = false;
        for entries in self.senders().values_mut() {
            let initial_len = entries.len();
            entries.retain(|entry| entry.id != subscription_id);
            found |= entries.len() < initial_len;
        }
        found
    }

    /// Number of live subscriptions on a topic
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.senders().get(topic).map_or(0, Vec::len)
    }
}
