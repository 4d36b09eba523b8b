//! End-to-end order lifecycle properties: no-loss, idempotence, expiry

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use common::{harness, harness_with_ttl, RECV_ADDR};
use ergon::chain::{AccountSnapshot, DelegationOutcome, ResourceLedger};
use ergon::domain::{Currency, OrderStatus, RentalDuration, SupplierAccount, TransactionKind};
use ergon::engine::FulfillmentEngine;
use ergon::error::ErgonError;
use ergon::pool::SupplierPool;
use ergon::services::{Sweeper, SweeperConfig};
use ergon::storage::{Ledger, MemoryStore, OrderStore, SupplierStore};

/// The worked scenario: 135000 energy for a day costs 1.08. A user with
/// exactly that balance ends at 0.00 on success.
#[tokio::test]
async fn worked_example_success_path() {
    let h = harness(vec![Ok(DelegationOutcome::confirmed("tx-1".to_string()))]).await;
    h.store
        .confirm_deposit(1, "dep-1", dec!(1.08), Currency::Trx)
        .await
        .unwrap();

    let order = h
        .engine
        .create_order(1, 135_000, RentalDuration::OneDay, RECV_ADDR)
        .await
        .unwrap();
    assert_eq!(order.cost_trx, dec!(1.08));

    let fulfilled = h.engine.fulfill(order.id).await.unwrap().unwrap();
    assert_eq!(fulfilled.status, OrderStatus::Completed);
    assert_eq!(h.store.get_balance(1).await.unwrap().trx, dec!(0.00));
}

/// Same scenario with a failing delegation: balance returns to 1.08 and
/// the order is terminal failed with a matching refund row.
#[tokio::test]
async fn worked_example_failure_refunds() {
    let h = harness(vec![Ok(DelegationOutcome::rejected(
        "CONTRACT_VALIDATE_ERROR".to_string(),
    ))])
    .await;
    h.store
        .confirm_deposit(1, "dep-1", dec!(1.08), Currency::Trx)
        .await
        .unwrap();

    let order = h
        .engine
        .create_order(1, 135_000, RentalDuration::OneDay, RECV_ADDR)
        .await
        .unwrap();
    let fulfilled = h.engine.fulfill(order.id).await.unwrap().unwrap();

    assert_eq!(fulfilled.status, OrderStatus::Failed);
    assert_eq!(h.store.get_balance(1).await.unwrap().trx, dec!(1.08));

    let txs = h.store.transactions(1, 10).await.unwrap();
    let kinds: Vec<TransactionKind> = txs.iter().map(|tx| tx.kind).collect();
    assert!(kinds.contains(&TransactionKind::Deduct));
    assert!(kinds.contains(&TransactionKind::Refund));
}

/// No-loss guarantee: every order that was debited ends either completed
/// (funds stay deducted) or failed/cancelled with a full refund.
#[tokio::test]
async fn no_loss_across_outcomes() {
    let outcomes = vec![
        Ok(DelegationOutcome::confirmed("tx-a".to_string())),
        Ok(DelegationOutcome::rejected("no capacity".to_string())),
        Err(ErgonError::ChainUnavailable("timeout".to_string())),
    ];
    let h = harness(outcomes).await;
    h.store
        .confirm_deposit(1, "dep-1", dec!(100), Currency::Trx)
        .await
        .unwrap();

    let mut completed_cost = dec!(0);
    for _ in 0..3 {
        let order = h
            .engine
            .create_order(1, 200_000, RentalDuration::OneDay, RECV_ADDR)
            .await
            .unwrap();
        let fulfilled = h.engine.fulfill(order.id).await.unwrap().unwrap();
        match fulfilled.status {
            OrderStatus::Completed => completed_cost += fulfilled.cost_trx,
            OrderStatus::Failed => {}
            other => panic!("unexpected terminal state {other}"),
        }
    }

    // Only the completed order's cost is gone
    assert_eq!(
        h.store.get_balance(1).await.unwrap().trx,
        dec!(100) - completed_cost
    );
}

/// Two concurrent fulfillment attempts produce exactly one debit and one
/// delegation; the loser is a no-op.
#[tokio::test]
async fn concurrent_fulfill_debits_once() {
    let h = harness(vec![]).await;
    h.store
        .confirm_deposit(1, "dep-1", dec!(10), Currency::Trx)
        .await
        .unwrap();

    let order = h
        .engine
        .create_order(1, 135_000, RentalDuration::OneDay, RECV_ADDR)
        .await
        .unwrap();

    let (a, b) = tokio::join!(h.engine.fulfill(order.id), h.engine.fulfill(order.id));
    let results = [a.unwrap(), b.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_none()).count(), 1);

    assert_eq!(*h.chain.delegations.lock().await, 1);
    let deducts = h
        .store
        .transactions(1, 10)
        .await
        .unwrap()
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Deduct)
        .count();
    assert_eq!(deducts, 1);
}

/// Expiry precedence: a stale pending order is swept to expired and a
/// late fulfillment trigger can no longer debit it.
#[tokio::test]
async fn expired_orders_are_never_debited() {
    let h = harness_with_ttl(vec![], 0).await;
    h.store
        .confirm_deposit(1, "dep-1", dec!(10), Currency::Trx)
        .await
        .unwrap();

    let order = h
        .engine
        .create_order(1, 135_000, RentalDuration::OneDay, RECV_ADDR)
        .await
        .unwrap();
    tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    assert!(order.is_expired(Utc::now()));

    let sweeper = Sweeper::new(
        h.engine.clone(),
        h.store.clone(),
        SweeperConfig {
            interval_secs: 30,
            batch_size: 10,
            pacing_delay_ms: 0,
        },
    );
    let report = sweeper.sweep().await.unwrap();
    assert_eq!(report.expired, 1);

    // Late trigger: the pending guard turns it into a no-op
    assert!(h.engine.fulfill(order.id).await.unwrap().is_none());

    let swept = OrderStore::get(h.store.as_ref(), order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(swept.status, OrderStatus::Expired);
    assert_eq!(h.store.get_balance(1).await.unwrap().trx, dec!(10));
    assert_eq!(*h.chain.delegations.lock().await, 0);
}

#[tokio::test]
async fn cancel_after_completion_is_rejected() {
    let h = harness(vec![Ok(DelegationOutcome::confirmed("tx-1".to_string()))]).await;
    h.store
        .confirm_deposit(1, "dep-1", dec!(10), Currency::Trx)
        .await
        .unwrap();

    let order = h
        .engine
        .create_order(1, 135_000, RentalDuration::OneDay, RECV_ADDR)
        .await
        .unwrap();
    h.engine.fulfill(order.id).await.unwrap();

    assert!(!h.engine.cancel_order(order.id).await.unwrap());
    // No refund sneaked in
    let refunds = h
        .store
        .transactions(1, 10)
        .await
        .unwrap()
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Refund)
        .count();
    assert_eq!(refunds, 0);
}

/// Supplier store whose reader always loses the race: while one
/// fulfillment attempt is looking at the pool, a rival attempt claims
/// the order and debits the user, and the pool comes back empty.
struct ContestedPool {
    inner: Arc<MemoryStore>,
    rival_claim: Mutex<Option<(Uuid, i64, Decimal)>>,
}

#[async_trait]
impl SupplierStore for ContestedPool {
    async fn upsert(&self, supplier: &SupplierAccount) -> ergon::Result<()> {
        self.inner.upsert(supplier).await
    }

    async fn get(&self, address: &str) -> ergon::Result<Option<SupplierAccount>> {
        SupplierStore::get(self.inner.as_ref(), address).await
    }

    async fn list_active(&self) -> ergon::Result<Vec<SupplierAccount>> {
        if let Some((order_id, user_id, cost)) = self.rival_claim.lock().await.take() {
            assert!(self.inner.begin_processing(order_id, "TRival").await?);
            assert!(
                self.inner
                    .deduct(user_id, cost, &order_id.to_string(), "energy rental charge")
                    .await?
            );
        }
        Ok(Vec::new())
    }

    async fn list_all(&self) -> ergon::Result<Vec<SupplierAccount>> {
        self.inner.list_all().await
    }

    async fn set_active(&self, address: &str, active: bool) -> ergon::Result<bool> {
        self.inner.set_active(address, active).await
    }

    async fn update_capacity(
        &self,
        address: &str,
        snapshot: &AccountSnapshot,
        checked_at: DateTime<Utc>,
    ) -> ergon::Result<()> {
        self.inner.update_capacity(address, snapshot, checked_at).await
    }
}

/// A fulfillment attempt that found the pool empty must not fail an
/// order that a concurrent attempt has claimed and debited in the
/// meantime; the claimed order stays processing with its funds intact
/// and the owner can still settle it.
#[tokio::test]
async fn empty_pool_failure_cannot_clobber_a_claimed_order() {
    let store = Arc::new(MemoryStore::new());
    let chain: Arc<dyn ResourceLedger> =
        Arc::new(common::ScriptedLedger::new(vec![]));
    let contested = Arc::new(ContestedPool {
        inner: store.clone(),
        rival_claim: Mutex::new(None),
    });
    let pool = Arc::new(SupplierPool::new(contested.clone(), chain.clone()));
    let engine = FulfillmentEngine::new(store.clone(), store.clone(), pool, chain, 30);

    store
        .confirm_deposit(1, "dep-1", dec!(10), Currency::Trx)
        .await
        .unwrap();
    let order = engine
        .create_order(1, 135_000, RentalDuration::OneDay, RECV_ADDR)
        .await
        .unwrap();
    *contested.rival_claim.lock().await = Some((order.id, 1, order.cost_trx));

    // This attempt sees an empty pool while the rival claims the order
    assert!(engine.fulfill(order.id).await.unwrap().is_none());

    let claimed = OrderStore::get(store.as_ref(), order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.status, OrderStatus::Processing);
    assert_eq!(store.get_balance(1).await.unwrap().trx, dec!(8.92));

    // The rival still owns the order and can complete it; no stray
    // refund ever appeared
    assert!(store.complete(order.id, "tx-rival").await.unwrap());
    let refunds = store
        .transactions(1, 10)
        .await
        .unwrap()
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Refund)
        .count();
    assert_eq!(refunds, 0);
}

#[tokio::test]
async fn validation_errors_never_persist_an_order() {
    let h = harness(vec![]).await;
    h.store
        .confirm_deposit(1, "dep-1", dec!(1000), Currency::Trx)
        .await
        .unwrap();

    // Below minimum
    assert!(h
        .engine
        .create_order(1, 999, RentalDuration::OneDay, RECV_ADDR)
        .await
        .is_err());
    // Above maximum
    assert!(h
        .engine
        .create_order(1, 10_000_001, RentalDuration::OneDay, RECV_ADDR)
        .await
        .is_err());
    // Bad address
    assert!(h
        .engine
        .create_order(1, 100_000, RentalDuration::OneDay, "not-an-address")
        .await
        .is_err());

    assert!(h
        .store
        .list(Some(1), None, 10, 0)
        .await
        .unwrap()
        .is_empty());
}
