//! Common types and utilities for the exchange
//!
//! This library contains shared types used across every crate of the
//! exchange workspace: decimal aliases for prices and cash, the unified
//! error type, and the domain models exchanged between the ledger, the
//! order books and the notification fan-out.

pub mod error;
pub mod model;
pub mod decimal;

/// Re-export important types
pub use error::{Error, Result, ErrorExt, IntoError};
pub use decimal::*;
pub use model::ids::{AccountId, OrderId, SubscriptionId, TradeId};
