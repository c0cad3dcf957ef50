//! Ledger domain types: accounts, transactions, and the request shapes that
//! create or patch them.

use chrono::{DateTime, Utc};
use finlyt_shared::types::{AccountId, OwnerId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::balance;

/// Direction of a transaction.
///
/// Income adds its amount to the account balance, expense subtracts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

impl TransactionKind {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {s}")),
        }
    }
}

/// Kind of account holding a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Physical cash.
    Cash,
    /// Bank account.
    Bank,
    /// Credit or debit card.
    Card,
    /// Prepaid or digital wallet.
    Wallet,
    /// UPI handle.
    Upi,
    /// Anything else.
    Other,
}

impl AccountKind {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
            Self::Card => "card",
            Self::Wallet => "wallet",
            Self::Upi => "upi",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "bank" => Ok(Self::Bank),
            "card" => Ok(Self::Card),
            "wallet" => Ok(Self::Wallet),
            "upi" => Ok(Self::Upi),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown account type: {s}")),
        }
    }
}

/// An account and its stored balance.
///
/// `balance` is never derived on read. It must always equal
/// `opening_balance` plus the effect of every transaction referencing the
/// account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Display name.
    pub name: String,
    /// Account kind.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// Balance the account was opened with.
    pub opening_balance: Decimal,
    /// Current stored balance.
    pub balance: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// An income or expense recorded against an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction ID.
    pub id: TransactionId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Income or expense.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Strictly positive amount.
    pub amount: Decimal,
    /// Category name, scoped to the owner.
    pub category: String,
    /// Optional free text.
    pub description: Option<String>,
    /// Account whose balance carries this transaction's effect.
    pub account_id: AccountId,
    /// When the transaction happened.
    pub date: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed contribution of this transaction to its account balance.
    #[must_use]
    pub fn effect(&self) -> Decimal {
        balance::effect(self.kind, self.amount)
    }
}

/// Wire shape of a create request.
///
/// Every field is optional so that a missing field surfaces as a validation
/// error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTransactionRequest {
    /// Income or expense.
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    /// Amount, must be positive.
    pub amount: Option<Decimal>,
    /// Category name.
    pub category: Option<String>,
    /// Target account.
    pub account: Option<AccountId>,
    /// Transaction date.
    pub date: Option<DateTime<Utc>>,
    /// Optional description.
    pub description: Option<String>,
}

/// A create request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Income or expense.
    pub kind: TransactionKind,
    /// Positive amount.
    pub amount: Decimal,
    /// Trimmed, non-empty category name.
    pub category: String,
    /// Target account.
    pub account_id: AccountId,
    /// Transaction date.
    pub date: DateTime<Utc>,
    /// Trimmed description, `None` when blank.
    pub description: Option<String>,
}

impl NewTransaction {
    /// Builds the record that will be persisted.
    #[must_use]
    pub fn into_transaction(self, owner_id: OwnerId, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            owner_id,
            kind: self.kind,
            amount: self.amount,
            category: self.category,
            description: self.description,
            account_id: self.account_id,
            date: self.date,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a transaction. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPatch {
    /// New direction.
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    /// New amount.
    pub amount: Option<Decimal>,
    /// New category.
    pub category: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Move the transaction to another account.
    pub account: Option<AccountId>,
    /// New date.
    pub date: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    /// Returns the record that results from applying this patch.
    #[must_use]
    pub fn apply(&self, existing: &Transaction, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id: existing.id,
            owner_id: existing.owner_id,
            kind: self.kind.unwrap_or(existing.kind),
            amount: self.amount.unwrap_or(existing.amount),
            category: self
                .category
                .as_deref()
                .map_or_else(|| existing.category.clone(), |c| c.trim().to_string()),
            description: match &self.description {
                Some(d) if d.trim().is_empty() => None,
                Some(d) => Some(d.trim().to_string()),
                None => existing.description.clone(),
            },
            account_id: self.account.unwrap_or(existing.account_id),
            date: self.date.unwrap_or(existing.date),
            created_at: existing.created_at,
            updated_at: now,
        }
    }
}

/// Outcome of comparing an account's stored balance with its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAudit {
    /// The audited account.
    pub account_id: AccountId,
    /// Balance as stored.
    pub stored: Decimal,
    /// Opening balance plus the effect of every referencing transaction.
    pub expected: Decimal,
    /// `stored - expected`.
    pub drift: Decimal,
    /// Number of transactions that reference the account.
    pub transaction_count: usize,
}

impl BalanceAudit {
    /// Returns true when the stored balance matches the transactions.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.drift.is_zero()
    }
}
