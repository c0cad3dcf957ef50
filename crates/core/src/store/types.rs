//! Query and write descriptions passed to an [`EntityStore`](super::EntityStore).

use chrono::{DateTime, Utc};
use finlyt_shared::types::{AccountId, OwnerId};
use rust_decimal::Decimal;

use crate::ledger::types::{Account, Transaction, TransactionKind};

/// Owner-scoped transaction filter.
///
/// The date bounds form a half-open interval: `start <= date < end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Owner scope, always applied.
    pub owner_id: OwnerId,
    /// Restrict to one account.
    pub account_id: Option<AccountId>,
    /// Restrict to income or expense.
    pub kind: Option<TransactionKind>,
    /// Restrict to one category name.
    pub category: Option<String>,
    /// Inclusive lower bound on `date`.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `date`.
    pub end: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// Matches every transaction of the owner.
    #[must_use]
    pub fn owned_by(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            account_id: None,
            kind: None,
            category: None,
            start: None,
            end: None,
        }
    }

    /// Filter by account.
    #[must_use]
    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Filter by kind.
    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter by category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Filter by the half-open interval `[start, end)`.
    #[must_use]
    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Returns true if the transaction passes every set criterion.
    #[must_use]
    pub fn matches(&self, tx: &Transaction) -> bool {
        tx.owner_id == self.owner_id
            && self.account_id.is_none_or(|a| tx.account_id == a)
            && self.kind.is_none_or(|k| tx.kind == k)
            && self.category.as_deref().is_none_or(|c| tx.category == c)
            && self.start.is_none_or(|s| tx.date >= s)
            && self.end.is_none_or(|e| tx.date < e)
    }
}

/// How matching transactions are grouped by `aggregate_transactions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// One row for everything that matched.
    Total,
    /// One row per kind.
    Kind,
    /// One row per category.
    Category,
    /// One row per (category, kind) pair.
    CategoryAndKind,
}

/// Sum and count for one group.
///
/// Key fields not part of the grouping are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTotal {
    /// Category key.
    pub category: Option<String>,
    /// Kind key.
    pub kind: Option<TransactionKind>,
    /// Sum of `amount`.
    pub total: Decimal,
    /// Number of transactions.
    pub count: u64,
}

/// One write inside a [`LedgerBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    /// Atomically add `delta` to an account balance.
    AdjustBalance {
        /// Target account.
        account_id: AccountId,
        /// Signed amount to add.
        delta: Decimal,
        /// Fail the batch when the account is missing instead of skipping.
        required: bool,
    },
    /// Insert a new transaction record.
    InsertTransaction(Transaction),
    /// Replace a transaction record, provided it still equals `expected`.
    ReplaceTransaction {
        /// The version the balance legs were computed from.
        expected: Transaction,
        /// The new version.
        updated: Transaction,
    },
    /// Remove a transaction record, provided it still equals `expected`.
    RemoveTransaction {
        /// The version the balance legs were computed from.
        expected: Transaction,
    },
}

/// Ordered writes that must commit or fail together.
///
/// Record writes that carry an `expected` version should come first, so a
/// stale batch is rejected before any balance moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBatch {
    /// Owner scope for every write.
    pub owner_id: OwnerId,
    /// Writes in application order.
    pub writes: Vec<LedgerWrite>,
}

impl LedgerBatch {
    /// Creates an empty batch for the owner.
    #[must_use]
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            writes: Vec::new(),
        }
    }

    /// Appends a balance adjustment.
    #[must_use]
    pub fn adjust(mut self, account_id: AccountId, delta: Decimal, required: bool) -> Self {
        self.writes.push(LedgerWrite::AdjustBalance {
            account_id,
            delta,
            required,
        });
        self
    }

    /// Appends a write.
    #[must_use]
    pub fn then(mut self, write: LedgerWrite) -> Self {
        self.writes.push(write);
        self
    }
}

/// What a committed batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Accounts after their adjustment, in write order.
    pub adjusted: Vec<Account>,
    /// Non-required adjustments skipped because the account was missing.
    pub skipped: Vec<AccountId>,
}
