//! Ledger account holding a participant's cash and shares
//!
//! Each account is guarded by its own mutex and every operation runs in a
//! single critical section, so each one is atomic on its own. An operation
//! that would drive a balance below zero fails without any partial effect.
//! The settlement operations are only called by the matching engine for
//! resources it reserved at submission time; a shortfall there is a broken
//! invariant and panics.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use common::decimal::{Amount, Quantity};
use common::error::{Error, Result};
use common::model::account::{AccountBalance, Balance};
use common::AccountId;
use tracing::debug;

#[derive(Debug)]
struct LedgerState {
    cash: Balance<Amount>,
    holdings: HashMap<String, Balance<Quantity>>,
    updated_at: DateTime<Utc>,
}

/// A participant's cash balance and share holdings
#[derive(Debug)]
pub struct LedgerAccount {
    id: AccountId,
    name: String,
    state: Mutex<LedgerState>,
}

impl LedgerAccount {
    /// Create an account with `initial_cash` available
    pub fn new(name: impl Into<String>, initial_cash: Amount) -> Result<Self> {
        ensure_non_negative_cash(initial_cash)?;
        Ok(Self {
            id: AccountId::new(),
            name: name.into(),
            state: Mutex::new(LedgerState {
                cash: Balance::new(initial_cash),
                holdings: HashMap::new(),
                updated_at: Utc::now(),
            }),
        })
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // A panic inside a critical section can only come from a settlement
    // invariant check, which aborts the matching loop anyway.
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add cash to the available balance
    pub fn credit(&self, amount: Amount) -> Result<()> {
        ensure_non_negative_cash(amount)?;
        let mut state = self.state();
        if state.cash.total().checked_add(amount).is_none() {
            return Err(Error::ValidationError(format!(
                "crediting {} would overflow the balance of account {}",
                amount, self.id
            )));
        }
        state.cash.deposit(amount);
        state.updated_at = Utc::now();
        debug!("Credited {} to account {}", amount, self.id);
        Ok(())
    }

    /// Remove cash from the available balance
    pub fn debit(&self, amount: Amount) -> Result<()> {
        ensure_non_negative_cash(amount)?;
        let mut state = self.state();
        state.cash.withdraw(amount).map_err(|available| {
            Error::InsufficientFunds(format!(
                "cannot debit {} from account {}, available {}",
                amount, self.id, available
            ))
        })?;
        state.updated_at = Utc::now();
        debug!("Debited {} from account {}", amount, self.id);
        Ok(())
    }

    /// Hold `amount` of available cash in escrow
    pub fn reserve_cash(&self, amount: Amount) -> Result<()> {
        ensure_non_negative_cash(amount)?;
        let mut state = self.state();
        state.cash.reserve(amount).map_err(|available| {
            Error::InsufficientFunds(format!(
                "cannot reserve {} on account {}, available {}",
                amount, self.id, available
            ))
        })?;
        state.updated_at = Utc::now();
        Ok(())
    }

    /// Return escrowed cash to the available balance
    pub fn release_cash(&self, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        let mut state = self.state();
        let released = state.cash.release(amount);
        assert!(
            released.is_ok(),
            "account {} released {} cash with only {:?} reserved",
            self.id,
            amount,
            released.err()
        );
        state.updated_at = Utc::now();
    }

    /// Add shares of `symbol` to the available holding
    pub fn add_holding(&self, symbol: &str, quantity: Quantity) {
        let mut state = self.state();
        state.holdings.entry(symbol.to_string()).or_default().deposit(quantity);
        state.updated_at = Utc::now();
        debug!("Added {} {} to account {}", quantity, symbol, self.id);
    }

    /// Remove available shares of `symbol`
    pub fn remove_holding(&self, symbol: &str, quantity: Quantity) -> Result<()> {
        let mut state = self.state();
        let mut holding = state.holdings.get(symbol).copied().unwrap_or_default();
        holding.withdraw(quantity).map_err(|available| {
            Error::InsufficientHoldings(format!(
                "cannot remove {} {} from account {}, available {}",
                quantity, symbol, self.id, available
            ))
        })?;
        state.holdings.insert(symbol.to_string(), holding);
        state.updated_at = Utc::now();
        Ok(())
    }

    /// Hold `quantity` available shares of `symbol` in escrow
    pub fn reserve_shares(&self, symbol: &str, quantity: Quantity) -> Result<()> {
        let mut state = self.state();
        let mut holding = state.holdings.get(symbol).copied().unwrap_or_default();
        holding.reserve(quantity).map_err(|available| {
            Error::InsufficientHoldings(format!(
                "cannot reserve {} {} on account {}, available {}",
                quantity, symbol, self.id, available
            ))
        })?;
        state.holdings.insert(symbol.to_string(), holding);
        state.updated_at = Utc::now();
        Ok(())
    }

    /// Return escrowed shares of `symbol` to the available holding
    pub fn release_shares(&self, symbol: &str, quantity: Quantity) {
        if quantity == 0 {
            return;
        }
        let mut state = self.state();
        let released = state.holdings.get_mut(symbol).map(|holding| holding.release(quantity));
        assert!(
            matches!(released, Some(Ok(()))),
            "account {} released {} {} without a matching reservation",
            self.id,
            quantity,
            symbol
        );
        state.updated_at = Utc::now();
    }

    /// Pay `amount` out of cash escrow
    pub fn settle_cash_out(&self, amount: Amount) {
        let mut state = self.state();
        let settled = state.cash.settle_reserved(amount);
        assert!(
            settled.is_ok(),
            "account {} paid {} with only {:?} in escrow",
            self.id,
            amount,
            settled.err()
        );
        state.updated_at = Utc::now();
    }

    /// Receive settlement cash into the available balance
    pub fn settle_cash_in(&self, amount: Amount) {
        assert!(amount >= Amount::ZERO, "account {} received negative settlement {}", self.id, amount);
        let mut state = self.state();
        state.cash.deposit(amount);
        state.updated_at = Utc::now();
    }

    /// Deliver `quantity` reserved shares of `symbol` out of the account
    pub fn settle_shares_out(&self, symbol: &str, quantity: Quantity) {
        let mut state = self.state();
        let settled = state.holdings.get_mut(symbol).map(|holding| holding.settle_reserved(quantity));
        assert!(
            matches!(settled, Some(Ok(()))),
            "account {} delivered {} {} without a matching reservation",
            self.id,
            quantity,
            symbol
        );
        state.updated_at = Utc::now();
    }

    /// Available plus reserved cash
    pub fn cash(&self) -> Amount {
        self.state().cash.total()
    }

    /// Cash that can still be withdrawn or reserved
    pub fn available_cash(&self) -> Amount {
        self.state().cash.available
    }

    /// Available plus reserved shares of `symbol`
    pub fn holding(&self, symbol: &str) -> Quantity {
        self.state().holdings.get(symbol).map_or(0, |holding| holding.total())
    }

    /// Consistent snapshot of the whole account
    pub fn snapshot(&self) -> AccountBalance {
        let state = self.state();
        AccountBalance {
            account_id: self.id,
            name: self.name.clone(),
            cash: state.cash,
            holdings: state
                .holdings
                .iter()
                .filter(|(_, holding)| holding.total() > 0)
                .map(|(symbol, holding)| (symbol.clone(), *holding))
                .collect(),
            updated_at: state.updated_at,
        }
    }
}

fn ensure_non_negative_cash(amount: Amount) -> Result<()> {
    if amount < Amount::ZERO {
        return Err(Error::ValidationError(format!("cash amount must not be negative: {}", amount)));
    }
    Ok(())
}
