//! Metapackage re-exporting the exchange crates for the cross-crate
//! integration tests in `tests/`

pub use account_service;
pub use common;
pub use market_data;
pub use matching_engine;
pub use trading_engine;

pub use trading_engine::{Exchange, ExchangeConfig};
