//! Configuration for the exchange process

use std::env;
use std::str::FromStr;

use common::decimal::{Price, Quantity};
use common::error::{Error, Result};
use matching_engine::EngineConfig;

/// Instruments listed when no `EXCHANGE_INSTRUMENTS` is set
pub const DEFAULT_INSTRUMENTS: &str = "AAPL:150.00,GOOG:2800.00";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::ConfigurationError(format!("unknown LOG_FORMAT {:?}", other))),
        }
    }
}

/// Configuration for the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeConfig {
    /// Instruments listed at start-up with their initial price
    pub instruments: Vec<(String, Price)>,
    /// Order admission limits
    pub engine: EngineConfig,
    /// Enable debug logging
    pub debug: bool,
    pub log_format: LogFormat,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            // The default list is a constant that always parses
            instruments: parse_instruments(DEFAULT_INSTRUMENTS).unwrap_or_default(),
            engine: EngineConfig::default(),
            debug: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ExchangeConfig {
    /// Create a new configuration using environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup, falling back to defaults
    /// for missing keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let instruments = match lookup("EXCHANGE_INSTRUMENTS") {
            Some(list) => parse_instruments(&list)?,
            None => defaults.instruments,
        };
        let engine = EngineConfig {
            max_order_quantity: parse_or("EXCHANGE_MAX_ORDER_QUANTITY", &lookup, defaults.engine.max_order_quantity)?,
            max_price: parse_or("EXCHANGE_MAX_PRICE", &lookup, defaults.engine.max_price)?,
            price_scale: parse_or("EXCHANGE_PRICE_SCALE", &lookup, defaults.engine.price_scale)?,
            strict_prices: lookup("EXCHANGE_STRICT_PRICES").map_or(Ok(false), |v| parse_flag("EXCHANGE_STRICT_PRICES", &v))?,
        };
        if engine.max_order_quantity == 0 {
            return Err(Error::ConfigurationError(
                "EXCHANGE_MAX_ORDER_QUANTITY must be positive".to_string(),
            ));
        }
        if engine.max_price <= Price::ZERO {
            return Err(Error::ConfigurationError("EXCHANGE_MAX_PRICE must be positive".to_string()));
        }
        Ok(Self {
            instruments,
            engine,
            debug: lookup("DEBUG").map_or(Ok(false), |v| parse_flag("DEBUG", &v))?,
            log_format: lookup("LOG_FORMAT").map_or(Ok(LogFormat::Pretty), |v| v.parse())?,
        })
    }

    /// Create a new configuration with custom values
    pub fn new(instruments: Vec<(String, Price)>, engine: EngineConfig) -> Self {
        Self {
            instruments,
            engine,
            ..Self::default()
        }
    }
}

/// Parse a `SYMBOL:PRICE,SYMBOL:PRICE` list
pub fn parse_instruments(list: &str) -> Result<Vec<(String, Price)>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (symbol, price) = entry.split_once(':').ok_or_else(|| {
                Error::ConfigurationError(format!("instrument {:?} is not SYMBOL:PRICE", entry))
            })?;
            let price = Price::from_str(price.trim())
                .map_err(|e| Error::ConfigurationError(format!("bad price for {}: {}", symbol, e)))?;
            Ok((symbol.trim().to_uppercase(), price))
        })
        .collect()
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| Error::ConfigurationError(format!("invalid {} {:?}: {}", key, value, e))),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::ConfigurationError(format!("invalid {} {:?}", key, other))),
    }
}
