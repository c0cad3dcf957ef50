//! Property-based tests for the ledger coordinator.
//!
//! - Balance invariant: after any sequence of creates, updates and deletes,
//!   every account balance equals its opening balance plus the effect of
//!   the transactions referencing it.
//! - Round trip: create followed by delete restores the balance exactly.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use finlyt_shared::config::LedgerConfig;
use finlyt_shared::types::OwnerId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::LedgerCoordinator;
use super::types::{AccountKind, CreateTransactionRequest, TransactionKind, TransactionPatch};
use crate::store::{EntityStore, MemoryStore};

/// Strategy to generate positive decimal amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
    prop_oneof![Just(TransactionKind::Income), Just(TransactionKind::Expense)]
}

#[derive(Debug, Clone)]
enum Op {
    Create {
        account: usize,
        kind: TransactionKind,
        amount: Decimal,
    },
    Update {
        target: usize,
        account: Option<usize>,
        kind: Option<TransactionKind>,
        amount: Option<Decimal>,
    },
    Delete {
        target: usize,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..3, kind_strategy(), positive_amount())
            .prop_map(|(account, kind, amount)| Op::Create { account, kind, amount }),
        2 => (
            any::<usize>(),
            proptest::option::of(0usize..3),
            proptest::option::of(kind_strategy()),
            proptest::option::of(positive_amount()),
        )
            .prop_map(|(target, account, kind, amount)| Op::Update { target, account, kind, amount }),
        1 => any::<usize>().prop_map(|target| Op::Delete { target }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every account stays consistent with its transactions after each step.
    #[test]
    fn prop_balance_invariant_holds(ops in prop::collection::vec(op_strategy(), 1..40)) {
        runtime().block_on(async {
            let store = Arc::new(MemoryStore::new());
            let ledger = LedgerCoordinator::new(Arc::clone(&store), &LedgerConfig::default());
            let owner = OwnerId::new();
            let date = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

            let mut accounts = Vec::new();
            for (i, opening) in [0i64, 2500, 100_000].into_iter().enumerate() {
                let account = ledger
                    .open_account(owner, &format!("Account {i}"), AccountKind::Bank, Decimal::new(opening, 2))
                    .await
                    .unwrap();
                accounts.push(account.id);
            }
            let mut live = Vec::new();

            for op in ops {
                match op {
                    Op::Create { account, kind, amount } => {
                        let tx = ledger
                            .create_transaction(owner, CreateTransactionRequest {
                                kind: Some(kind),
                                amount: Some(amount),
                                category: Some("General".to_string()),
                                account: Some(accounts[account]),
                                date: Some(date),
                                description: None,
                            })
                            .await
                            .unwrap();
                        live.push(tx.id);
                    }
                    Op::Update { target, account, kind, amount } => {
                        if live.is_empty() {
                            continue;
                        }
                        let id = live[target % live.len()];
                        let patch = TransactionPatch {
                            kind,
                            amount,
                            account: account.map(|a| accounts[a]),
                            ..TransactionPatch::default()
                        };
                        ledger.update_transaction(owner, id, patch).await.unwrap();
                    }
                    Op::Delete { target } => {
                        if live.is_empty() {
                            continue;
                        }
                        let id = live.swap_remove(target % live.len());
                        ledger.delete_transaction(owner, id).await.unwrap();
                    }
                }

                for account in &accounts {
                    let audit = ledger.audit_account(owner, *account).await.unwrap();
                    prop_assert!(audit.is_consistent(), "drift {} on {}", audit.drift, account);
                }
            }
            Ok(())
        })?;
    }

    /// Creating then deleting a transaction leaves the balance untouched.
    #[test]
    fn prop_create_delete_round_trip(
        opening in 0i64..10_000_000,
        kind in kind_strategy(),
        amount in positive_amount(),
    ) {
        runtime().block_on(async {
            let store = Arc::new(MemoryStore::new());
            let ledger = LedgerCoordinator::new(Arc::clone(&store), &LedgerConfig::default());
            let owner = OwnerId::new();
            let opening = Decimal::new(opening, 2);
            let account = ledger
                .open_account(owner, "Wallet", AccountKind::Wallet, opening)
                .await
                .unwrap();

            let tx = ledger
                .create_transaction(owner, CreateTransactionRequest {
                    kind: Some(kind),
                    amount: Some(amount),
                    category: Some("General".to_string()),
                    account: Some(account.id),
                    date: Some(Utc::now()),
                    description: None,
                })
                .await
                .unwrap();
            ledger.delete_transaction(owner, tx.id).await.unwrap();

            let after = store.find_account(owner, account.id).await.unwrap().unwrap();
            prop_assert_eq!(after.balance, opening);
            Ok(())
        })?;
    }

    /// Changing only the amount moves the balance by exactly the difference.
    #[test]
    fn prop_amount_change_moves_by_difference(
        kind in kind_strategy(),
        from in positive_amount(),
        to in positive_amount(),
    ) {
        runtime().block_on(async {
            let store = Arc::new(MemoryStore::new());
            let ledger = LedgerCoordinator::new(Arc::clone(&store), &LedgerConfig::default());
            let owner = OwnerId::new();
            let account = ledger
                .open_account(owner, "Cash", AccountKind::Cash, Decimal::ZERO)
                .await
                .unwrap();
            let tx = ledger
                .create_transaction(owner, CreateTransactionRequest {
                    kind: Some(kind),
                    amount: Some(from),
                    category: Some("General".to_string()),
                    account: Some(account.id),
                    date: Some(Utc::now()),
                    description: None,
                })
                .await
                .unwrap();
            let before = store.find_account(owner, account.id).await.unwrap().unwrap().balance;

            ledger
                .update_transaction(owner, tx.id, TransactionPatch {
                    amount: Some(to),
                    ..TransactionPatch::default()
                })
                .await
                .unwrap();

            let after = store.find_account(owner, account.id).await.unwrap().unwrap().balance;
            let sign = match kind {
                TransactionKind::Income => Decimal::ONE,
                TransactionKind::Expense => Decimal::NEGATIVE_ONE,
            };
            prop_assert_eq!(after - before, sign * (to - from));
            Ok(())
        })?;
    }
}
