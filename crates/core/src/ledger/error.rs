//! Ledger error types.
//!
//! Validation and not-found errors are raised before any write is issued.
//! `Consistency` is reserved for failures between the writes of one
//! operation and is always surfaced, never folded into a generic failure.

use std::time::Duration;

use finlyt_shared::AppError;
use finlyt_shared::types::{AccountId, TransactionId};
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// A required field was not supplied.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A text field was supplied but empty.
    #[error("Field cannot be blank: {0}")]
    BlankField(&'static str),

    /// Transaction amount is zero or negative.
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    /// Opening balance is negative.
    #[error("Opening balance cannot be negative")]
    NegativeOpeningBalance,

    /// A money field has more than four decimal places.
    #[error("Field has more than 4 decimal places: {0}")]
    TooPrecise(&'static str),

    // ========== Lookup Errors ==========
    /// Account not found for this owner.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Transaction not found for this owner.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    // ========== Write Errors ==========
    /// Another writer changed the transaction after it was read. Nothing
    /// was written.
    #[error("Transaction {0} was modified concurrently, reload and retry")]
    Conflict(TransactionId),

    /// The writes of one operation did not all commit.
    #[error("Partial failure during {operation}: {reason} (rolled back: {compensated})")]
    Consistency {
        /// The ledger operation that failed.
        operation: &'static str,
        /// What went wrong.
        reason: String,
        /// Whether the writes that did apply were undone.
        compensated: bool,
    },

    /// The read phase exceeded its budget; nothing was written.
    #[error("Ledger operation timed out after {0:?}, no changes were made")]
    Timeout(Duration),

    /// Store error outside of a write sequence.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Returns true for input errors detected before touching the store.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::BlankField(_)
                | Self::NonPositiveAmount
                | Self::NegativeOpeningBalance
                | Self::TooPrecise(_)
        )
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::BlankField(_) => "BLANK_FIELD",
            Self::NonPositiveAmount => "NON_POSITIVE_AMOUNT",
            Self::NegativeOpeningBalance => "NEGATIVE_OPENING_BALANCE",
            Self::TooPrecise(_) => "TOO_PRECISE",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::Conflict(_) => "TRANSACTION_CONFLICT",
            Self::Consistency { .. } => "LEDGER_INCONSISTENT",
            Self::Timeout(_) => "LEDGER_TIMEOUT",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::MissingField(_)
            | Self::BlankField(_)
            | Self::NonPositiveAmount
            | Self::NegativeOpeningBalance
            | Self::TooPrecise(_) => 400,

            // 404 Not Found
            Self::AccountNotFound(_) | Self::TransactionNotFound(_) => 404,

            // 409 Conflict
            Self::Conflict(_) => 409,

            // 503 Service Unavailable - nothing happened, try later
            Self::Timeout(_) => 503,

            // 500 Internal Server Error
            Self::Consistency { .. } | Self::Store(_) => 500,
        }
    }

    /// Returns true if the caller may safely retry the same request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Conflict(_) => true,
            Self::Consistency { compensated, .. } => *compensated,
            _ => false,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            e if e.is_validation() => Self::Validation(message),
            LedgerError::AccountNotFound(_) | LedgerError::TransactionNotFound(_) => {
                Self::NotFound(message)
            }
            LedgerError::Conflict(_) => Self::Conflict(message),
            LedgerError::Consistency { .. } => Self::Consistency(message),
            LedgerError::Timeout(_) => Self::Timeout(message),
            _ => Self::Database(message),
        }
    }
}
