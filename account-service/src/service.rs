//! Account service implementation

use std::sync::Arc;

use common::decimal::{Amount, Quantity};
use common::error::{Error, ErrorExt, Result};
use common::model::account::AccountBalance;
use common::model::order::{Order, Release, Side};
use common::model::trade::Trade;
use common::AccountId;
use tracing::{debug, info};

use crate::ledger::LedgerAccount;
use crate::registry::{AccountRegistry, InMemoryAccountRegistry};

/// Account service for managing participant balances and order escrow
#[derive(Clone)]
pub struct AccountService {
    /// Registry of account data
    registry: Arc<dyn AccountRegistry>,
}

impl Default for AccountService {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountService {
    /// Create a new account service backed by an in-memory registry
    pub fn new() -> Self {
        Self {
            registry: Arc::new(InMemoryAccountRegistry::new()),
        }
    }

    /// Create a new account service over an existing registry
    pub fn with_registry(registry: Arc<dyn AccountRegistry>) -> Self {
        Self { registry }
    }

    /// The registry the service reads and writes
    pub fn registry(&self) -> Arc<dyn AccountRegistry> {
        self.registry.clone()
    }

    /// Register a participant with some starting cash
    pub fn open_account(&self, name: &str, initial_cash: Amount) -> Result<Arc<LedgerAccount>> {
        self.registry
            .create_account(name, initial_cash)
            .with_context(|| format!("Failed to open account for {}", name))
    }

    /// Get an account by ID
    pub fn get_account(&self, id: AccountId) -> Result<Arc<LedgerAccount>> {
        self.registry.get_account(id)
    }

    /// Snapshot of an account's cash and holdings
    pub fn get_balance(&self, id: AccountId) -> Result<AccountBalance> {
        Ok(self.registry.get_account(id)?.snapshot())
    }

    /// Snapshots of every account
    pub fn get_balances(&self) -> Vec<AccountBalance> {
        self.registry.accounts().iter().map(|account| account.snapshot()).collect()
    }

    /// Deposit cash into an account
    pub fn deposit_cash(&self, id: AccountId, amount: Amount) -> Result<AccountBalance> {
        info!("Depositing {} cash to account {}", amount, id);
        let account = self.registry.get_account(id)?;
        account
            .credit(amount)
            .with_context(|| format!("Failed to deposit to account {}", id))?;
        Ok(account.snapshot())
    }

    /// Withdraw available cash from an account
    pub fn withdraw_cash(&self, id: AccountId, amount: Amount) -> Result<AccountBalance> {
        info!("Withdrawing {} cash from account {}", amount, id);
        let account = self.registry.get_account(id)?;
        account
            .debit(amount)
            .with_context(|| format!("Failed to withdraw from account {}", id))?;
        Ok(account.snapshot())
    }

    /// Deposit shares of an instrument into an account
    pub fn deposit_shares(&self, id: AccountId, symbol: &str, quantity: Quantity) -> Result<AccountBalance> {
        if quantity == 0 {
            return Err(Error::ValidationError("share deposit must be positive".to_string()));
        }
        info!("Depositing {} {} to account {}", quantity, symbol, id);
        let account = self.registry.get_account(id)?;
        account.add_holding(symbol, quantity);
        Ok(account.snapshot())
    }

    /// Withdraw available shares of an instrument from an account
    pub fn withdraw_shares(&self, id: AccountId, symbol: &str, quantity: Quantity) -> Result<AccountBalance> {
        info!("Withdrawing {} {} from account {}", quantity, symbol, id);
        let account = self.registry.get_account(id)?;
        account
            .remove_holding(symbol, quantity)
            .with_context(|| format!("Failed to withdraw shares from account {}", id))?;
        Ok(account.snapshot())
    }

    /// Reserve what an order needs before it enters the book: `cash_escrow`
    /// for a buy, the full quantity of shares for a sell.
    pub fn reserve_for_order(account: &LedgerAccount, order: &Order, cash_escrow: Amount) -> Result<()> {
        match order.side() {
            Side::Buy => {
                debug!("Reserving {} cash for order {}", cash_escrow, order.id());
                account
                    .reserve_cash(cash_escrow)
                    .with_context(|| format!("Cannot place buy order {}", order.id()))
            }
            Side::Sell => {
                debug!("Reserving {} {} for order {}", order.quantity(), order.symbol(), order.id());
                account
                    .reserve_shares(order.symbol(), order.quantity())
                    .with_context(|| format!("Cannot place sell order {}", order.id()))
            }
        }
    }

    /// Return what a cancelled order still held
    pub fn release_for_order(account: &LedgerAccount, order: &Order, release: Release) {
        debug!(
            "Releasing {} cash and {} {} for order {}",
            release.cash,
            release.shares,
            order.symbol(),
            order.id()
        );
        account.release_cash(release.cash);
        account.release_shares(order.symbol(), release.shares);
    }

    /// Move cash and shares for one trade.
    ///
    /// The buyer pays `trade.amount` out of escrow and receives the shares;
    /// `buyer_refund` is escrow the buy order no longer needs. The seller
    /// delivers reserved shares and is credited the same amount the buyer
    /// paid.
    pub fn settle_trade(buyer: &LedgerAccount, seller: &LedgerAccount, trade: &Trade, buyer_refund: Amount) {
        buyer.settle_cash_out(trade.amount);
        buyer.add_holding(&trade.symbol, trade.quantity);
        buyer.release_cash(buyer_refund);

        seller.settle_shares_out(&trade.symbol, trade.quantity);
        seller.settle_cash_in(trade.amount);

        debug!(
            "Settled trade {}: {} {} at {} from {} to {}",
            trade.id, trade.quantity, trade.symbol, trade.price, trade.seller_id, trade.buyer_id
        );
    }
}
