//! Market data for listed instruments: last trade prices, subscriber
//! fan-out for trades and order status notifications for owners.

pub mod channel;
pub mod instrument;
pub mod notifier;
pub mod observer;
pub mod registry;

pub use channel::{MarketDataChannel, Message, Topic};
pub use instrument::Instrument;
pub use notifier::NotificationHub;
pub use observer::{OrderObserver, PriceObserver};
pub use registry::InstrumentRegistry;
