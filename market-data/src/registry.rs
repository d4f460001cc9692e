//! Registry of listed instruments

use std::sync::Arc;

use common::decimal::Price;
use common::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::instrument::{normalize_symbol, Instrument};

/// Instruments by symbol
#[derive(Default)]
pub struct InstrumentRegistry {
    instruments: DashMap<String, Arc<Instrument>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a new instrument; fails if the symbol is already listed
    pub fn list(&self, symbol: &str, initial_price: Price) -> Result<Arc<Instrument>> {
        let instrument = Arc::new(Instrument::new(symbol, initial_price)?);
        match self.instruments.entry(instrument.symbol().to_string()) {
            Entry::Occupied(_) => Err(Error::DuplicateInstrument(instrument.symbol().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(instrument.clone());
                info!("Listed instrument {} at {}", instrument.symbol(), initial_price);
                Ok(instrument)
            }
        }
    }

    /// Look up an instrument by symbol (case-insensitive)
    pub fn get_instrument(&self, symbol: &str) -> Result<Arc<Instrument>> {
        let key = normalize_symbol(symbol)
            .map_err(|_| Error::InstrumentNotFound(symbol.to_string()))?;
        self.instruments
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or(Error::InstrumentNotFound(key))
    }

    /// Listed symbols, sorted
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.instruments.iter().map(|entry| entry.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
