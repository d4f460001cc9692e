//! Account service for managing participant cash and share holdings

pub mod ledger;
pub mod registry;
pub mod service;

pub use ledger::LedgerAccount;
pub use registry::{AccountRegistry, InMemoryAccountRegistry};
pub use service::AccountService;
