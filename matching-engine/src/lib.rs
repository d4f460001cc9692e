//! Per-instrument order books and the matching engine that drives them

pub mod config;
pub mod engine;
mod order_book;
pub mod policy;

pub use config::EngineConfig;
pub use engine::{trade_price, MatchingEngine, MatchingResult};
pub use order_book::{AskSide, BidSide, BookSide, OrderBook, RestingOrder, SidePriority};
pub use policy::{can_execute, ExecutionPolicy};
