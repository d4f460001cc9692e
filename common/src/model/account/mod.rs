//! Account models and related types

use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Amount, Quantity};
use crate::model::ids::AccountId;

/// A balance split into the part free to use and the part held in escrow
/// for resting orders.
///
/// Used for cash (`Balance<Amount>`) and for share holdings
/// (`Balance<Quantity>`). Neither part can go below zero: every operation
/// that would overdraw returns `Err` carrying the amount that was actually
/// available, and leaves the balance untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance<T> {
    /// Free to withdraw or reserve
    pub available: T,
    /// Held for resting orders
    pub reserved: T,
}

impl<T> Balance<T>
where
    T: Copy + Default + PartialOrd + Add<Output = T> + Sub<Output = T>,
{
    /// Create a balance with everything available
    pub fn new(available: T) -> Self {
        Self {
            available,
            reserved: T::default(),
        }
    }

    /// Available plus reserved
    pub fn total(&self) -> T {
        self.available + self.reserved
    }

    /// Add funds to the balance
    pub fn deposit(&mut self, amount: T) {
        self.available = self.available + amount;
    }

    /// Remove available funds from the balance
    pub fn withdraw(&mut self, amount: T) -> Result<(), T> {
        if amount > self.available {
            return Err(self.available);
        }
        self.available = self.available - amount;
        Ok(())
    }

    /// Move available funds into escrow
    pub fn reserve(&mut self, amount: T) -> Result<(), T> {
        if amount > self.available {
            return Err(self.available);
        }
        self.available = self.available - amount;
        self.reserved = self.reserved + amount;
        Ok(())
    }

    /// Move escrowed funds back to available
    pub fn release(&mut self, amount: T) -> Result<(), T> {
        if amount > self.reserved {
            return Err(self.reserved);
        }
        self.reserved = self.reserved - amount;
        self.available = self.available + amount;
        Ok(())
    }

    /// Remove escrowed funds that leave the account in a settlement
    pub fn settle_reserved(&mut self, amount: T) -> Result<(), T> {
        if amount > self.reserved {
            return Err(self.reserved);
        }
        self.reserved = self.reserved - amount;
        Ok(())
    }
}

/// Point-in-time view of a participant account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Account ID
    pub account_id: AccountId,
    /// Participant display name
    pub name: String,
    /// Cash balance
    pub cash: Balance<Amount>,
    /// Share holdings by instrument symbol
    pub holdings: BTreeMap<String, Balance<Quantity>>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Holding for `symbol`, zero if the account never held it
    pub fn holding(&self, symbol: &str) -> Balance<Quantity> {
        self.holdings.get(symbol).copied().unwrap_or_default()
    }
}
