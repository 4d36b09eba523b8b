use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::chain::AccountSnapshot;
use crate::domain::{
    BalanceTransaction, Balances, Currency, Order, OrderStatus, SupplierAccount, UserWallet,
};
use crate::error::Result;

/// The balance ledger. All four mutating operations are serialized per
/// user by the implementation (row lock in Postgres, store mutex in
/// memory); callers never write balance fields directly.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current balances, creating the user with zero balances if absent
    async fn get_balance(&self, user_id: i64) -> Result<Balances>;

    /// Debit the TRX balance. Fails closed: returns `false` with no
    /// mutation and no transaction row when `amount <= 0` or the balance
    /// is insufficient. Balance decrement, `total_spent` bump, and the
    /// `deduct` row are committed in one storage transaction.
    async fn deduct(
        &self,
        user_id: i64,
        amount: Decimal,
        reference_id: &str,
        description: &str,
    ) -> Result<bool>;

    /// Credit the TRX balance back. Creates the user if absent; always
    /// succeeds for positive amounts. The ledger does not deduplicate
    /// refunds; the order state machine guards against double refunds.
    async fn refund(
        &self,
        user_id: i64,
        amount: Decimal,
        reference_id: &str,
        description: &str,
    ) -> Result<bool>;

    /// Credit a confirmed on-chain deposit, converting USDT to TRX at the
    /// fixed published rate. Idempotent on `external_ref`: a replay of an
    /// already-recorded deposit returns `false` without mutating.
    async fn confirm_deposit(
        &self,
        user_id: i64,
        external_ref: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<bool>;

    /// Bump lifetime stat counters after a completed order
    async fn record_completion(&self, user_id: i64, cost: Decimal) -> Result<()>;

    /// Most recent balance transactions for a user, newest first
    async fn transactions(&self, user_id: i64, limit: i64) -> Result<Vec<BalanceTransaction>>;
}

/// Order persistence. State transitions are compare-and-swap updates: a
/// single conditional write whose `bool` return says whether the guard
/// matched. Callers treat `false` as an idempotent no-op.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>>;

    /// Orders newest first, optionally filtered by user and/or status
    async fn list(
        &self,
        user_id: Option<i64>,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>>;

    /// Oldest pending orders, capped, for the sweep loop
    async fn pending_batch(&self, limit: i64) -> Result<Vec<Order>>;

    /// pending -> processing, recording the assigned supplier
    async fn begin_processing(&self, id: Uuid, supplier_address: &str) -> Result<bool>;

    /// processing -> completed, recording the chain transaction
    async fn complete(&self, id: Uuid, tx_hash: &str) -> Result<bool>;

    /// `from` -> failed with a human-readable message; the caller names
    /// the source state it observed, so a task that saw the order
    /// pending can never fail it out from under the task that owns the
    /// processing transition
    async fn fail(&self, id: Uuid, message: &str, from: OrderStatus) -> Result<bool>;

    /// `from` -> cancelled; the caller decides (and has verified) the
    /// source state so the refund decision stays in the engine
    async fn cancel(&self, id: Uuid, from: OrderStatus) -> Result<bool>;

    /// pending -> expired
    async fn expire(&self, id: Uuid) -> Result<bool>;
}

/// Supplier account pool persistence
#[async_trait]
pub trait SupplierStore: Send + Sync {
    /// Insert or update a supplier row keyed by address
    async fn upsert(&self, supplier: &SupplierAccount) -> Result<()>;

    async fn get(&self, address: &str) -> Result<Option<SupplierAccount>>;

    async fn list_active(&self) -> Result<Vec<SupplierAccount>>;

    async fn list_all(&self) -> Result<Vec<SupplierAccount>>;

    async fn set_active(&self, address: &str, active: bool) -> Result<bool>;

    /// Write back a capacity refresh result
    async fn update_capacity(
        &self,
        address: &str,
        snapshot: &AccountSnapshot,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Saved receiving addresses
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Active wallets for a user, newest first
    async fn list_wallets(&self, user_id: i64) -> Result<Vec<UserWallet>>;

    /// Returns `false` when the address is already saved for the user
    async fn add_wallet(&self, user_id: i64, address: &str) -> Result<bool>;

    /// Soft delete; returns `false` when the address is unknown
    async fn remove_wallet(&self, user_id: i64, address: &str) -> Result<bool>;
}
