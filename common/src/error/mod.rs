//! Error types for the exchange
//!
//! This module provides the unified error type shared by the ledger, the
//! matching engine and the exchange facade. Validation and reservation
//! failures are returned to the caller synchronously; nothing inside the
//! matching loop produces an `Error`.

use std::fmt::Display;
use thiserror::Error;

/// Exchange error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed order (quantity, price, kind, owner or symbol)
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// Not enough available cash for a debit or reservation
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Not enough available shares for a withdrawal or reservation
    #[error("Insufficient holdings: {0}")]
    InsufficientHoldings(String),

    /// Unknown order id
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Cancel attempted on a filled or cancelled order
    #[error("Order already terminal: {0}")]
    AlreadyTerminal(String),

    /// Unknown instrument symbol
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    /// Instrument symbol listed twice
    #[error("Instrument already listed: {0}")]
    DuplicateInstrument(String),

    /// Unknown account id
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Rejected argument outside an order (amount, symbol, ratio)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Bad environment or command-line setting
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// JSON encoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decimal arithmetic or parse failure
    #[error("Decimal conversion error: {0}")]
    DecimalError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Message carried by every variant except `Serialization`
    fn message_mut(&mut self) -> Option<&mut String> {
        match self {
            Error::InvalidOrder(msg)
            | Error::InsufficientFunds(msg)
            | Error::InsufficientHoldings(msg)
            | Error::OrderNotFound(msg)
            | Error::AlreadyTerminal(msg)
            | Error::InstrumentNotFound(msg)
            | Error::DuplicateInstrument(msg)
            | Error::AccountNotFound(msg)
            | Error::ValidationError(msg)
            | Error::ConfigurationError(msg)
            | Error::Internal(msg)
            | Error::DecimalError(msg) => Some(msg),
            Error::Serialization(_) => None,
        }
    }
}

/// Prefix an error's message while keeping its variant, so callers can
/// still match on the kind of failure
pub trait ErrorExt<T> {
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T> ErrorExt<T> for Result<T> {
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|mut err| {
            if let Some(msg) = err.message_mut() {
                *msg = format!("{}: {}", context_fn(), msg);
            }
            err
        })
    }
}

/// Wrap a foreign error as `Error::Internal`
pub trait IntoError {
    fn into_error(self, message: &str) -> Error;
}

impl<E: std::error::Error> IntoError for E {
    fn into_error(self, message: &str) -> Error {
        Error::Internal(format!("{}: {}", message, self))
    }
}

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::DecimalError(err.to_string())
    }
}
