//! Budget error types.

use finlyt_shared::AppError;
use finlyt_shared::types::BudgetId;
use thiserror::Error;

use crate::analytics::AnalyticsError;
use crate::store::StoreError;

/// Budget-related errors.
#[derive(Debug, Error)]
pub enum BudgetError {
    /// A required field was not supplied.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Category name is empty.
    #[error("Category cannot be blank")]
    BlankCategory,

    /// Month outside 1 through 12.
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    /// Limit cannot be negative.
    #[error("Limit cannot be negative")]
    NegativeLimit,

    /// Limit has more than four decimal places.
    #[error("Limit has more than 4 decimal places")]
    LimitTooPrecise,

    /// Budget not found.
    #[error("Budget not found: {0}")]
    NotFound(BudgetId),

    /// Spend lookup failed.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// Store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BudgetError {
    /// Returns true for input errors detected before touching the store.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            Self::MissingField(_)
            | Self::BlankCategory
            | Self::InvalidMonth(_)
            | Self::NegativeLimit
            | Self::LimitTooPrecise => true,
            Self::Analytics(inner) => inner.is_validation(),
            Self::NotFound(_) | Self::Store(_) => false,
        }
    }
}

impl From<BudgetError> for AppError {
    fn from(err: BudgetError) -> Self {
        let message = err.to_string();
        match err {
            BudgetError::Analytics(inner) => inner.into(),
            e if e.is_validation() => Self::Validation(message),
            BudgetError::NotFound(_) => Self::NotFound(message),
            _ => Self::Database(message),
        }
    }
}
