//! Exchange facade, configuration and process bootstrap

pub mod config;
pub mod demo;
pub mod exchange;
pub mod logging;
pub mod simulation;

pub use config::{ExchangeConfig, LogFormat};
pub use exchange::Exchange;
pub use logging::init_tracing;
