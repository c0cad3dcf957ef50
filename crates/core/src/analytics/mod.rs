//! Time-bounded aggregation over transactions.
//!
//! This module provides read-only views:
//! - Monthly summary (income, expense, savings)
//! - Expense breakdown by category
//! - Activity of every owner category, zero-filled

pub mod error;
pub mod range;
pub mod service;
pub mod types;


pub use error::AnalyticsError;
pub use range::DateRange;
pub use service::AggregationEngine;
pub use types::*;
