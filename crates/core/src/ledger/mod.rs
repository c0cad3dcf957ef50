//! Account balances and the transactions that move them.
//!
//! This module implements the core ledger functionality:
//! - Domain types for accounts, transactions and their requests
//! - Balance effect calculations and auditing
//! - Input validation
//! - Per-transaction locking
//! - The ledger coordinator
//! - Error types for ledger operations

pub mod balance;
pub mod error;
pub mod locks;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod tests;

pub use error::LedgerError;
pub use service::LedgerCoordinator;
pub use types::{
    Account, AccountKind, BalanceAudit, CreateTransactionRequest, NewTransaction, Transaction,
    TransactionKind, TransactionPatch,
};
