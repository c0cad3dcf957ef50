//! Balance effect calculations.
//!
//! A transaction contributes `+amount` (income) or `-amount` (expense) to
//! the balance of the account it references. Reverting a transaction applies
//! the negated effect.

use finlyt_shared::types::AccountId;
use rust_decimal::Decimal;

use super::types::{Account, BalanceAudit, Transaction, TransactionKind};

/// Signed contribution of an amount of the given kind.
#[must_use]
pub fn effect(kind: TransactionKind, amount: Decimal) -> Decimal {
    match kind {
        TransactionKind::Income => amount,
        TransactionKind::Expense => -amount,
    }
}

/// Balance change that undoes a transaction.
#[must_use]
pub fn revert(tx: &Transaction) -> Decimal {
    -tx.effect()
}

/// Net balance change when `existing` is replaced by `updated` on the same
/// account, collapsed into a single addition.
#[must_use]
pub fn replacement_delta(existing: &Transaction, updated: &Transaction) -> Decimal {
    updated.effect() - existing.effect()
}

/// One balance adjustment produced by a transaction update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceShift {
    /// Account to adjust.
    pub account_id: AccountId,
    /// Signed amount to add.
    pub delta: Decimal,
}

/// Balance adjustments needed to move from `existing` to `updated`.
///
/// Same account: one shift with the net delta (omitted when zero).
/// Different accounts: revert on the old account, then apply on the new one.
#[must_use]
pub fn update_shifts(existing: &Transaction, updated: &Transaction) -> Vec<BalanceShift> {
    if existing.account_id == updated.account_id {
        let delta = replacement_delta(existing, updated);
        if delta.is_zero() {
            return Vec::new();
        }
        return vec![BalanceShift {
            account_id: existing.account_id,
            delta,
        }];
    }

    vec![
        BalanceShift {
            account_id: existing.account_id,
            delta: revert(existing),
        },
        BalanceShift {
            account_id: updated.account_id,
            delta: updated.effect(),
        },
    ]
}

/// Opening balance plus the effect of every given transaction.
#[must_use]
pub fn expected_balance<'a>(
    opening_balance: Decimal,
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> Decimal {
    transactions
        .into_iter()
        .fold(opening_balance, |acc, tx| acc + tx.effect())
}

/// Compares an account's stored balance with the transactions referencing it.
#[must_use]
pub fn audit(account: &Account, transactions: &[Transaction]) -> BalanceAudit {
    let referencing: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| tx.account_id == account.id)
        .collect();
    let expected = expected_balance(account.opening_balance, referencing.iter().copied());

    BalanceAudit {
        account_id: account.id,
        stored: account.balance,
        expected,
        drift: account.balance - expected,
        transaction_count: referencing.len(),
    }
}
