//! Aggregation error types.

use chrono::NaiveDate;
use finlyt_shared::AppError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while resolving a period or aggregating over it.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Neither a complete from/to pair nor a complete month/year pair.
    #[error("month and year, or from and to, are required")]
    MissingPeriod,

    /// Month outside 1 through 12.
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    /// The period names a date the calendar cannot represent.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Invalid date range.
    #[error("Invalid date range: from {from} is after to {to}")]
    InvalidDateRange {
        /// First day.
        from: NaiveDate,
        /// Last day.
        to: NaiveDate,
    },

    /// The configured reporting timezone is not an IANA name.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Store failure while reading.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AnalyticsError {
    /// Returns true for errors caused by the caller's period.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingPeriod
                | Self::InvalidMonth(_)
                | Self::InvalidDate(_)
                | Self::InvalidDateRange { .. }
        )
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        let message = err.to_string();
        match err {
            e if e.is_validation() => Self::Validation(message),
            AnalyticsError::UnknownTimezone(_) => Self::Internal(message),
            _ => Self::Database(message),
        }
    }
}
