//! Ledger accounting properties over the in-memory adapter

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ergon::domain::Currency;
use ergon::storage::{Ledger, MemoryStore};

/// balance == sum(transaction.amount) after any call sequence,
/// including rejected calls, which must leave no trace
#[tokio::test]
async fn conservation_holds_across_mixed_operations() {
    let store = MemoryStore::new();
    let user = 1;

    assert!(store
        .confirm_deposit(user, "dep-1", dec!(100), Currency::Trx)
        .await
        .unwrap());
    assert!(store.deduct(user, dec!(30), "o1", "charge").await.unwrap());
    assert!(store.refund(user, dec!(30), "o1", "refund").await.unwrap());
    assert!(store.deduct(user, dec!(45.5), "o2", "charge").await.unwrap());
    // Rejected: more than the remaining balance
    assert!(!store.deduct(user, dec!(1000), "o3", "charge").await.unwrap());
    // Rejected: non-positive amounts
    assert!(!store.deduct(user, dec!(0), "o4", "charge").await.unwrap());
    assert!(!store.deduct(user, dec!(-5), "o5", "charge").await.unwrap());

    let balance = store.get_balance(user).await.unwrap().trx;
    let txs = store.transactions(user, 100).await.unwrap();
    let sum: Decimal = txs.iter().map(|tx| tx.amount).sum();

    assert_eq!(balance, dec!(54.5));
    assert_eq!(sum, balance);
    // Exactly the four accepted operations are recorded
    assert_eq!(txs.len(), 4);
    // Every row's balance_after snapshot is consistent with a running sum
    let mut running = Decimal::ZERO;
    for tx in txs.iter().rev() {
        running += tx.amount;
        assert_eq!(tx.balance_after, running);
    }
}

#[tokio::test]
async fn deposit_replay_credits_exactly_once() {
    let store = MemoryStore::new();

    assert!(store
        .confirm_deposit(7, "txhash-abc", dec!(50), Currency::Trx)
        .await
        .unwrap());
    assert!(!store
        .confirm_deposit(7, "txhash-abc", dec!(50), Currency::Trx)
        .await
        .unwrap());

    assert_eq!(store.get_balance(7).await.unwrap().trx, dec!(50));
    assert_eq!(store.transactions(7, 10).await.unwrap().len(), 1);
}

/// Two racing confirmations of the same deposit: exactly one credits,
/// the loser reports a replay rather than an error
#[tokio::test]
async fn concurrent_deposit_confirmations_credit_once() {
    let store = MemoryStore::new();

    let (a, b) = tokio::join!(
        store.confirm_deposit(7, "txhash-abc", dec!(50), Currency::Trx),
        store.confirm_deposit(7, "txhash-abc", dec!(50), Currency::Trx),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a != b);

    assert_eq!(store.get_balance(7).await.unwrap().trx, dec!(50));
    assert_eq!(store.transactions(7, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn usdt_deposits_convert_at_the_published_rate() {
    let store = MemoryStore::new();

    assert!(store
        .confirm_deposit(7, "txhash-usdt", dec!(38.826), Currency::Usdt)
        .await
        .unwrap());

    // 38.826 USDT / 0.38826 = 100 TRX
    assert_eq!(store.get_balance(7).await.unwrap().trx, dec!(100));
}

#[tokio::test]
async fn refund_creates_missing_user() {
    let store = MemoryStore::new();

    assert!(store
        .refund(99, dec!(12), "order-x", "goodwill refund")
        .await
        .unwrap());
    assert_eq!(store.get_balance(99).await.unwrap().trx, dec!(12));
}

/// The ledger does not deduplicate refunds; that guard lives in the
/// order state machine
#[tokio::test]
async fn ledger_accepts_repeated_refund_references() {
    let store = MemoryStore::new();

    assert!(store.refund(1, dec!(5), "order-1", "refund").await.unwrap());
    assert!(store.refund(1, dec!(5), "order-1", "refund").await.unwrap());
    assert_eq!(store.get_balance(1).await.unwrap().trx, dec!(10));
}

#[tokio::test]
async fn get_balance_creates_user_with_zero_balances() {
    let store = MemoryStore::new();
    let balances = store.get_balance(12345).await.unwrap();
    assert_eq!(balances.trx, Decimal::ZERO);
    assert_eq!(balances.usdt, Decimal::ZERO);
}
