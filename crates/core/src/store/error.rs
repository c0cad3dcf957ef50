//! Store error types.

use finlyt_shared::types::{AccountId, TransactionId};
use thiserror::Error;

/// Errors reported by an [`EntityStore`](super::EntityStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required account does not exist for the owner.
    #[error("Account not found: {0}")]
    AccountMissing(AccountId),

    /// A transaction targeted by a write does not exist for the owner.
    #[error("Transaction not found: {0}")]
    TransactionMissing(TransactionId),

    /// A transaction no longer matches the version the write was based on.
    #[error("Transaction changed concurrently: {0}")]
    Conflict(TransactionId),

    /// A unique key is already taken.
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    /// A batch failed after at least one of its writes had been applied.
    #[error("Batch aborted at write {step}: {reason} (compensated: {compensated})")]
    BatchAborted {
        /// Zero-based index of the write that failed.
        step: usize,
        /// The underlying failure.
        reason: String,
        /// Whether every applied write was undone.
        compensated: bool,
    },

    /// Backend failure (connection, query, serialization).
    #[error("Backend error: {0}")]
    Backend(String),
}
