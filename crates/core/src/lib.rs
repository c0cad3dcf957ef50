//! Core business logic for Finlyt.
//!
//! This crate contains the ledger, aggregation and budget logic with ZERO web
//! or database dependencies. Persistence goes through the injected
//! [`store::EntityStore`] handle.
//!
//! # Modules
//!
//! - `ledger` - Account balances kept consistent with their transactions
//! - `analytics` - Period summaries and category breakdowns
//! - `budget` - Monthly category budgets and their usage
//! - `store` - The persistence seam and an in-memory implementation

pub mod analytics;
pub mod budget;
pub mod ledger;
pub mod store;

pub use analytics::AggregationEngine;
pub use budget::BudgetTracker;
pub use ledger::LedgerCoordinator;
pub use store::{EntityStore, MemoryStore};
