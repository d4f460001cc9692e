//! Registry of participant accounts

use std::sync::Arc;

use common::decimal::Amount;
use common::error::{Error, Result};
use common::AccountId;
use dashmap::DashMap;
use tracing::info;

use crate::ledger::LedgerAccount;

/// Account registry trait defining the interface for account storage.
///
/// Accounts are handed out as shared handles; the registry owns them and
/// orders only reference them by [`AccountId`].
pub trait AccountRegistry: Send + Sync {
    /// Create and store a new account
    fn create_account(&self, name: &str, initial_cash: Amount) -> Result<Arc<LedgerAccount>>;

    /// Get an account by ID
    fn get_account(&self, id: AccountId) -> Result<Arc<LedgerAccount>>;

    /// All registered accounts
    fn accounts(&self) -> Vec<Arc<LedgerAccount>>;
}

/// In-memory account registry
#[derive(Default)]
pub struct InMemoryAccountRegistry {
    /// Accounts by ID
    accounts: DashMap<AccountId, Arc<LedgerAccount>>,
}

impl InMemoryAccountRegistry {
    /// Create a new in-memory account registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountRegistry for InMemoryAccountRegistry {
    fn create_account(&self, name: &str, initial_cash: Amount) -> Result<Arc<LedgerAccount>> {
        let account = Arc::new(LedgerAccount::new(name, initial_cash)?);
        self.accounts.insert(account.id(), account.clone());
        info!("Registered account {} ({}) with {} cash", account.id(), name, initial_cash);
        Ok(account)
    }

    fn get_account(&self, id: AccountId) -> Result<Arc<LedgerAccount>> {
        self.accounts
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::AccountNotFound(format!("Account not found: {}", id)))
    }

    fn accounts(&self) -> Vec<Arc<LedgerAccount>> {
        self.accounts.iter().map(|entry| entry.value().clone()).collect()
    }
}
