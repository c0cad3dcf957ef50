//! Ledger coordinator scenario tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use finlyt_shared::config::LedgerConfig;
use finlyt_shared::types::{AccountId, BudgetId, OwnerId, TransactionId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::LedgerError;
use super::service::LedgerCoordinator;
use super::types::{Account, AccountKind, CreateTransactionRequest, Transaction, TransactionKind, TransactionPatch};
use crate::analytics::types::Category;
use crate::budget::types::Budget;
use crate::store::{
    BatchReceipt, EntityStore, GroupTotal, Grouping, LedgerBatch, MemoryStore, StoreError,
    TransactionFilter, batch,
};

fn ledger(store: Arc<MemoryStore>) -> LedgerCoordinator<MemoryStore> {
    LedgerCoordinator::new(store, &LedgerConfig::default())
}

fn expense(account: AccountId, amount: Decimal) -> CreateTransactionRequest {
    CreateTransactionRequest {
        kind: Some(TransactionKind::Expense),
        amount: Some(amount),
        category: Some("Food".to_string()),
        account: Some(account),
        date: Some(Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap()),
        description: None,
    }
}

async fn balance_of<S: EntityStore + ?Sized>(store: &S, owner: OwnerId, account: AccountId) -> Decimal {
    store
        .find_account(owner, account)
        .await
        .unwrap()
        .unwrap()
        .balance
}

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let cash = ledger
        .open_account(owner, "Cash", AccountKind::Cash, dec!(1000))
        .await
        .unwrap();

    let tx = ledger.create_transaction(owner, expense(cash.id, dec!(200))).await.unwrap();
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(800));

    let patch = TransactionPatch {
        amount: Some(dec!(300)),
        ..TransactionPatch::default()
    };
    ledger.update_transaction(owner, tx.id, patch).await.unwrap();
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(700));

    ledger.delete_transaction(owner, tx.id).await.unwrap();
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(1000));
    assert!(store.find_transaction(owner, tx.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_then_delete_restores_balance_exactly() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let bank = ledger
        .open_account(owner, "Bank", AccountKind::Bank, dec!(12.34))
        .await
        .unwrap();

    let request = CreateTransactionRequest {
        kind: Some(TransactionKind::Income),
        ..expense(bank.id, dec!(0.07))
    };
    let tx = ledger.create_transaction(owner, request).await.unwrap();
    assert_eq!(balance_of(&*store, owner, bank.id).await, dec!(12.41));

    let removed = ledger.delete_transaction(owner, tx.id).await.unwrap();
    assert_eq!(removed.id, tx.id);
    assert_eq!(balance_of(&*store, owner, bank.id).await, dec!(12.34));
}

#[tokio::test]
async fn test_description_only_update_keeps_balance() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(500)).await.unwrap();
    let tx = ledger.create_transaction(owner, expense(cash.id, dec!(50))).await.unwrap();

    let patch = TransactionPatch {
        description: Some("team lunch".to_string()),
        ..TransactionPatch::default()
    };
    let updated = ledger.update_transaction(owner, tx.id, patch).await.unwrap();

    assert_eq!(updated.description.as_deref(), Some("team lunch"));
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(450));
}

#[tokio::test]
async fn test_flipping_kind_moves_twice_the_amount() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(1000)).await.unwrap();
    let tx = ledger.create_transaction(owner, expense(cash.id, dec!(200))).await.unwrap();

    let patch = TransactionPatch {
        kind: Some(TransactionKind::Income),
        ..TransactionPatch::default()
    };
    ledger.update_transaction(owner, tx.id, patch).await.unwrap();

    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(1200));
}

#[tokio::test]
async fn test_cross_account_move() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let p = ledger.open_account(owner, "P", AccountKind::Bank, dec!(1000)).await.unwrap();
    let q = ledger.open_account(owner, "Q", AccountKind::Wallet, dec!(1000)).await.unwrap();
    let tx = ledger.create_transaction(owner, expense(p.id, dec!(100))).await.unwrap();
    let p_before = balance_of(&*store, owner, p.id).await;
    let q_before = balance_of(&*store, owner, q.id).await;

    let patch = TransactionPatch {
        account: Some(q.id),
        ..TransactionPatch::default()
    };
    let moved = ledger.update_transaction(owner, tx.id, patch).await.unwrap();

    let p_after = balance_of(&*store, owner, p.id).await;
    let q_after = balance_of(&*store, owner, q.id).await;
    assert_eq!(moved.account_id, q.id);
    assert_eq!(p_after - p_before, dec!(100));
    assert_eq!(q_after - q_before, dec!(-100));
    assert_eq!((p_after + q_after) - (p_before + q_before), Decimal::ZERO);
}

#[tokio::test]
async fn test_create_rejects_unknown_or_foreign_account() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let stranger = OwnerId::new();
    let theirs = ledger.open_account(stranger, "Theirs", AccountKind::Cash, dec!(10)).await.unwrap();

    let err = ledger
        .create_transaction(owner, expense(AccountId::new(), dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));

    let err = ledger
        .create_transaction(owner, expense(theirs.id, dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
    assert_eq!(balance_of(&*store, stranger, theirs.id).await, dec!(10));
    assert!(store
        .find_transactions(&TransactionFilter::owned_by(owner))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_invalid_create_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(100)).await.unwrap();

    let err = ledger
        .create_transaction(owner, expense(cash.id, dec!(-5)))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(100));
}

#[tokio::test]
async fn test_other_owner_cannot_touch_transaction() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let intruder = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(100)).await.unwrap();
    let tx = ledger.create_transaction(owner, expense(cash.id, dec!(10))).await.unwrap();

    let err = ledger
        .update_transaction(intruder, tx.id, TransactionPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TransactionNotFound(id) if id == tx.id));

    let err = ledger.delete_transaction(intruder, tx.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::TransactionNotFound(_)));
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(90));
}

#[tokio::test]
async fn test_move_to_unknown_account_rejected() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(100)).await.unwrap();
    let tx = ledger.create_transaction(owner, expense(cash.id, dec!(10))).await.unwrap();

    let patch = TransactionPatch {
        account: Some(AccountId::new()),
        ..TransactionPatch::default()
    };
    let err = ledger.update_transaction(owner, tx.id, patch).await.unwrap_err();

    assert!(matches!(err, LedgerError::AccountNotFound(_)));
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(90));
    let stored = store.find_transaction(owner, tx.id).await.unwrap().unwrap();
    assert_eq!(stored.account_id, cash.id);
}

/// Stores an expense whose account was never created, as if it had been
/// deleted after the transaction was recorded.
async fn insert_orphan<S: EntityStore + ?Sized>(store: &S, owner: OwnerId, amount: Decimal) -> Transaction {
    let at = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
    let orphan = Transaction {
        id: TransactionId::new(),
        owner_id: owner,
        kind: TransactionKind::Expense,
        amount,
        category: "Food".to_string(),
        description: None,
        account_id: AccountId::new(),
        date: at,
        created_at: at,
        updated_at: at,
    };
    store.insert_transaction(orphan).await.unwrap()
}

#[tokio::test]
async fn test_vanished_account_is_skipped_on_delete() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let orphan = insert_orphan(&*store, owner, dec!(40)).await;

    ledger.delete_transaction(owner, orphan.id).await.unwrap();

    assert!(store.find_transaction(owner, orphan.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_audit_detects_drift() {
    let store = Arc::new(MemoryStore::new());
    let ledger = ledger(Arc::clone(&store));
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(100)).await.unwrap();
    ledger.create_transaction(owner, expense(cash.id, dec!(30))).await.unwrap();

    let audit = ledger.audit_account(owner, cash.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.expected, dec!(70));
    assert_eq!(audit.transaction_count, 1);

    // Bypass the coordinator.
    store.adjust_balance(owner, cash.id, dec!(5)).await.unwrap();

    let audit = ledger.audit_account(owner, cash.id).await.unwrap();
    assert_eq!(audit.drift, dec!(5));
    assert!(!audit.is_consistent());

    let err = ledger.audit_account(owner, AccountId::new()).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
}

#[tokio::test]
async fn test_open_account_validation() {
    let ledger = ledger(Arc::new(MemoryStore::new()));
    let owner = OwnerId::new();

    let err = ledger
        .open_account(owner, "  ", AccountKind::Other, dec!(0))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::BlankField("name")));

    let err = ledger
        .open_account(owner, "Card", AccountKind::Card, dec!(-1))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NegativeOpeningBalance));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_do_not_lose_updates() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(ledger(Arc::clone(&store)));
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(10000)).await.unwrap();

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger.create_transaction(owner, expense(cash.id, dec!(7.50))).await
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(9625));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_of_one_transaction_stay_consistent() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(ledger(Arc::clone(&store)));
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(1000)).await.unwrap();
    let tx = ledger.create_transaction(owner, expense(cash.id, dec!(1))).await.unwrap();

    let tasks: Vec<_> = (1..=20)
        .map(|n| {
            let ledger = Arc::clone(&ledger);
            let patch = TransactionPatch {
                amount: Some(Decimal::from(n)),
                ..TransactionPatch::default()
            };
            tokio::spawn(async move { ledger.update_transaction(owner, tx.id, patch).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let audit = ledger.audit_account(owner, cash.id).await.unwrap();
    assert!(audit.is_consistent(), "drift {}", audit.drift);
}

// ========== Fault injection ==========

/// Delegates to a [`MemoryStore`] and injects failures. Uses the default
/// compensating `apply_batch`.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    fail_inserts: AtomicBool,
    fail_adjust_for: std::sync::Mutex<Option<AccountId>>,
    read_delay: Option<Duration>,
    receipts: std::sync::Mutex<Vec<BatchReceipt>>,
}

impl FaultyStore {
    fn slow(delay: Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..Self::default()
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl EntityStore for FaultyStore {
    async fn find_account(&self, owner_id: OwnerId, account_id: AccountId) -> Result<Option<Account>, StoreError> {
        self.pause().await;
        self.inner.find_account(owner_id, account_id).await
    }

    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        self.inner.insert_account(account).await
    }

    async fn adjust_balance(
        &self,
        owner_id: OwnerId,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Option<Account>, StoreError> {
        if *self.fail_adjust_for.lock().unwrap() == Some(account_id) {
            return Err(StoreError::Backend("injected adjust failure".to_string()));
        }
        self.inner.adjust_balance(owner_id, account_id, delta).await
    }

    async fn find_transaction(
        &self,
        owner_id: OwnerId,
        transaction_id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        self.pause().await;
        self.inner.find_transaction(owner_id, transaction_id).await
    }

    async fn find_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, StoreError> {
        self.inner.find_transactions(filter).await
    }

    async fn insert_transaction(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected insert failure".to_string()));
        }
        self.inner.insert_transaction(transaction).await
    }

    async fn replace_transaction(
        &self,
        expected: &Transaction,
        updated: Transaction,
    ) -> Result<Option<Transaction>, StoreError> {
        self.inner.replace_transaction(expected, updated).await
    }

    async fn remove_transaction(&self, expected: &Transaction) -> Result<Option<Transaction>, StoreError> {
        self.inner.remove_transaction(expected).await
    }

    async fn aggregate_transactions(
        &self,
        filter: &TransactionFilter,
        grouping: Grouping,
    ) -> Result<Vec<GroupTotal>, StoreError> {
        self.inner.aggregate_transactions(filter, grouping).await
    }

    async fn list_categories(&self, owner_id: OwnerId) -> Result<Vec<Category>, StoreError> {
        self.inner.list_categories(owner_id).await
    }

    async fn insert_category(&self, category: Category) -> Result<Category, StoreError> {
        self.inner.insert_category(category).await
    }

    async fn upsert_budget(&self, budget: Budget) -> Result<Budget, StoreError> {
        self.inner.upsert_budget(budget).await
    }

    async fn find_budgets(&self, owner_id: OwnerId, month: u32, year: i32) -> Result<Vec<Budget>, StoreError> {
        self.inner.find_budgets(owner_id, month, year).await
    }

    async fn remove_budget(&self, owner_id: OwnerId, budget_id: BudgetId) -> Result<Option<Budget>, StoreError> {
        self.inner.remove_budget(owner_id, budget_id).await
    }

    async fn apply_batch(&self, batch: LedgerBatch) -> Result<BatchReceipt, StoreError> {
        let receipt = batch::apply_with_compensation(self, batch).await?;
        self.receipts.lock().unwrap().push(receipt.clone());
        Ok(receipt)
    }
}

#[tokio::test]
async fn test_failed_insert_is_compensated() {
    let store = Arc::new(FaultyStore::default());
    let ledger = LedgerCoordinator::new(Arc::clone(&store), &LedgerConfig::default());
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(1000)).await.unwrap();
    store.fail_inserts.store(true, Ordering::SeqCst);

    let err = ledger
        .create_transaction(owner, expense(cash.id, dec!(200)))
        .await
        .unwrap_err();

    match &err {
        LedgerError::Consistency {
            operation,
            compensated,
            ..
        } => {
            assert_eq!(*operation, "create_transaction");
            assert!(*compensated);
        }
        other => panic!("expected Consistency, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(1000));
    assert!(store
        .find_transactions(&TransactionFilter::owned_by(owner))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_failed_second_leg_of_move_is_compensated() {
    let store = Arc::new(FaultyStore::default());
    let ledger = LedgerCoordinator::new(Arc::clone(&store), &LedgerConfig::default());
    let owner = OwnerId::new();
    let p = ledger.open_account(owner, "P", AccountKind::Bank, dec!(500)).await.unwrap();
    let q = ledger.open_account(owner, "Q", AccountKind::Bank, dec!(500)).await.unwrap();
    let tx = ledger.create_transaction(owner, expense(p.id, dec!(100))).await.unwrap();
    *store.fail_adjust_for.lock().unwrap() = Some(q.id);

    let patch = TransactionPatch {
        account: Some(q.id),
        ..TransactionPatch::default()
    };
    let err = ledger.update_transaction(owner, tx.id, patch).await.unwrap_err();

    assert!(matches!(err, LedgerError::Consistency { compensated: true, .. }));
    assert_eq!(balance_of(&*store, owner, p.id).await, dec!(400));
    assert_eq!(balance_of(&*store, owner, q.id).await, dec!(500));
    let stored = store.find_transaction(owner, tx.id).await.unwrap().unwrap();
    assert_eq!(stored.account_id, p.id);
}

#[tokio::test]
async fn test_first_write_failure_is_not_a_consistency_error() {
    let store = Arc::new(FaultyStore::default());
    let ledger = LedgerCoordinator::new(Arc::clone(&store), &LedgerConfig::default());
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(50)).await.unwrap();
    *store.fail_adjust_for.lock().unwrap() = Some(cash.id);

    let err = ledger
        .create_transaction(owner, expense(cash.id, dec!(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Store(StoreError::Backend(_))));
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(50));
}

#[tokio::test]
async fn test_slow_read_phase_times_out_without_writing() {
    let store = Arc::new(FaultyStore::slow(Duration::from_millis(300)));
    let ledger = LedgerCoordinator::new(
        Arc::clone(&store),
        &LedgerConfig {
            operation_timeout_ms: 20,
        },
    );
    let owner = OwnerId::new();
    let cash = ledger.open_account(owner, "Cash", AccountKind::Cash, dec!(100)).await.unwrap();

    let err = ledger
        .create_transaction(owner, expense(cash.id, dec!(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Timeout(_)));
    assert!(err.is_retryable());
    assert_eq!(store.inner.find_account(owner, cash.id).await.unwrap().unwrap().balance, dec!(100));
    assert!(store
        .find_transactions(&TransactionFilter::owned_by(owner))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_update_on_vanished_account_replaces_record_and_skips_balance() {
    let store = Arc::new(FaultyStore::default());
    let ledger = LedgerCoordinator::new(Arc::clone(&store), &LedgerConfig::default());
    let owner = OwnerId::new();
    let orphan = insert_orphan(&*store, owner, dec!(40)).await;

    let patch = TransactionPatch {
        amount: Some(dec!(65)),
        ..TransactionPatch::default()
    };
    let updated = ledger.update_transaction(owner, orphan.id, patch).await.unwrap();

    assert_eq!(updated.amount, dec!(65));
    let stored = store.find_transaction(owner, orphan.id).await.unwrap().unwrap();
    assert_eq!(stored, updated);
    assert!(store.find_account(owner, orphan.account_id).await.unwrap().is_none());

    let receipts = store.receipts.lock().unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].skipped, vec![orphan.account_id]);
    assert!(receipts[0].adjusted.is_empty());
}

#[tokio::test]
async fn test_move_off_vanished_account_applies_only_new_leg() {
    let store = Arc::new(FaultyStore::default());
    let ledger = LedgerCoordinator::new(Arc::clone(&store), &LedgerConfig::default());
    let owner = OwnerId::new();
    let live = ledger.open_account(owner, "Live", AccountKind::Bank, dec!(500)).await.unwrap();
    let orphan = insert_orphan(&*store, owner, dec!(40)).await;

    let patch = TransactionPatch {
        account: Some(live.id),
        amount: Some(dec!(25)),
        ..TransactionPatch::default()
    };
    let moved = ledger.update_transaction(owner, orphan.id, patch).await.unwrap();

    assert_eq!(moved.account_id, live.id);
    assert_eq!(balance_of(&*store, owner, live.id).await, dec!(475));
    let receipts = store.receipts.lock().unwrap();
    assert_eq!(receipts[0].skipped, vec![orphan.account_id]);
    assert_eq!(receipts[0].adjusted.len(), 1);
    assert_eq!(receipts[0].adjusted[0].id, live.id);
    drop(receipts);

    let audit = ledger.audit_account(owner, live.id).await.unwrap();
    assert!(audit.is_consistent(), "drift {}", audit.drift);
}

#[tokio::test]
async fn test_two_coordinators_cannot_both_apply_a_stale_update() {
    // Separate coordinators share no locks, as with two processes on one database.
    let store = Arc::new(FaultyStore::slow(Duration::from_millis(50)));
    let config = LedgerConfig::default();
    let first = LedgerCoordinator::new(Arc::clone(&store), &config);
    let second = LedgerCoordinator::new(Arc::clone(&store), &config);
    let owner = OwnerId::new();
    let cash = first.open_account(owner, "Cash", AccountKind::Cash, dec!(1000)).await.unwrap();
    let tx = first.create_transaction(owner, expense(cash.id, dec!(200))).await.unwrap();

    let to = |amount| TransactionPatch {
        amount: Some(amount),
        ..TransactionPatch::default()
    };
    let (a, b) = tokio::join!(
        first.update_transaction(owner, tx.id, to(dec!(300))),
        second.update_transaction(owner, tx.id, to(dec!(400))),
    );

    let conflicts = [&a, &b]
        .iter()
        .filter(|result| matches!(result, Err(LedgerError::Conflict(id)) if *id == tx.id))
        .count();
    assert_eq!(conflicts, 1, "results: {a:?} / {b:?}");
    let winner = a.or(b).unwrap();

    let stored = store.find_transaction(owner, tx.id).await.unwrap().unwrap();
    assert_eq!(stored.amount, winner.amount);
    assert_eq!(balance_of(&*store, owner, cash.id).await, dec!(1000) - winner.amount);
    let audit = first.audit_account(owner, cash.id).await.unwrap();
    assert!(audit.is_consistent(), "drift {}", audit.drift);
}

#[tokio::test]
async fn test_stale_delete_after_concurrent_update_is_rejected() {
    let store = Arc::new(FaultyStore::slow(Duration::from_millis(50)));
    let config = LedgerConfig::default();
    let first = LedgerCoordinator::new(Arc::clone(&store), &config);
    let second = LedgerCoordinator::new(Arc::clone(&store), &config);
    let owner = OwnerId::new();
    let cash = first.open_account(owner, "Cash", AccountKind::Cash, dec!(1000)).await.unwrap();
    let tx = first.create_transaction(owner, expense(cash.id, dec!(200))).await.unwrap();

    let patch = TransactionPatch {
        amount: Some(dec!(300)),
        ..TransactionPatch::default()
    };
    let (updated, deleted) = tokio::join!(
        first.update_transaction(owner, tx.id, patch),
        second.delete_transaction(owner, tx.id),
    );

    assert_ne!(updated.is_ok(), deleted.is_ok(), "results: {updated:?} / {deleted:?}");
    let audit = first.audit_account(owner, cash.id).await.unwrap();
    assert!(audit.is_consistent(), "drift {}", audit.drift);
    let expected = match store.find_transaction(owner, tx.id).await.unwrap() {
        Some(stored) => dec!(1000) - stored.amount,
        None => dec!(1000),
    };
    assert_eq!(balance_of(&*store, owner, cash.id).await, expected);
}
