//! Monthly category budgets and their usage.

pub mod error;
pub mod service;
pub mod types;
pub mod usage;


pub use error::BudgetError;
pub use service::BudgetTracker;
pub use types::{Budget, BudgetPeriod, BudgetUsage, UpsertBudgetRequest, UsageFigures};
pub use usage::usage;
