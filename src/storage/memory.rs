use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::traits::{Ledger, OrderStore, SupplierStore, WalletStore};
use crate::chain::AccountSnapshot;
use crate::domain::{
    BalanceTransaction, Balances, Currency, Order, OrderStatus, SupplierAccount, TransactionKind,
    User, UserWallet, USDT_PER_TRX,
};
use crate::error::Result;

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    transactions: Vec<BalanceTransaction>,
    orders: HashMap<Uuid, Order>,
    suppliers: HashMap<String, SupplierAccount>,
    wallets: Vec<UserWallet>,
    next_tx_id: i64,
    next_wallet_id: i32,
}

impl Inner {
    fn user_mut(&mut self, user_id: i64) -> &mut User {
        self.users.entry(user_id).or_insert_with(|| User::new(user_id))
    }

    fn push_transaction(
        &mut self,
        user_id: i64,
        kind: TransactionKind,
        amount: Decimal,
        balance_after: Decimal,
        reference_id: &str,
        description: &str,
    ) {
        self.next_tx_id += 1;
        self.transactions.push(BalanceTransaction {
            id: Some(self.next_tx_id),
            user_id,
            kind,
            amount,
            balance_after,
            reference_id: reference_id.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        });
    }
}

/// In-memory storage adapter. One mutex over the whole store gives the
/// same per-user serialization the Postgres row locks provide. Used by
/// the test suite and by local dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn get_balance(&self, user_id: i64) -> Result<Balances> {
        let mut inner = self.inner.lock().await;
        Ok(inner.user_mut(user_id).balances())
    }

    async fn deduct(
        &self,
        user_id: i64,
        amount: Decimal,
        reference_id: &str,
        description: &str,
    ) -> Result<bool> {
        if amount <= Decimal::ZERO {
            return Ok(false);
        }

        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(user_id);
        if user.balance_trx < amount {
            return Ok(false);
        }

        user.balance_trx -= amount;
        user.total_spent += amount;
        user.updated_at = Utc::now();
        let balance_after = user.balance_trx;

        inner.push_transaction(
            user_id,
            TransactionKind::Deduct,
            -amount,
            balance_after,
            reference_id,
            description,
        );
        Ok(true)
    }

    async fn refund(
        &self,
        user_id: i64,
        amount: Decimal,
        reference_id: &str,
        description: &str,
    ) -> Result<bool> {
        if amount <= Decimal::ZERO {
            return Ok(false);
        }

        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(user_id);
        user.balance_trx += amount;
        user.updated_at = Utc::now();
        let balance_after = user.balance_trx;

        inner.push_transaction(
            user_id,
            TransactionKind::Refund,
            amount,
            balance_after,
            reference_id,
            description,
        );
        Ok(true)
    }

    async fn confirm_deposit(
        &self,
        user_id: i64,
        external_ref: &str,
        amount: Decimal,
        currency: Currency,
    ) -> Result<bool> {
        if amount <= Decimal::ZERO {
            return Ok(false);
        }

        let mut inner = self.inner.lock().await;
        if inner
            .transactions
            .iter()
            .any(|tx| tx.reference_id == external_ref)
        {
            return Ok(false);
        }

        let trx_amount = match currency {
            Currency::Trx => amount,
            Currency::Usdt => amount / USDT_PER_TRX,
        };

        let user = inner.user_mut(user_id);
        user.balance_trx += trx_amount;
        user.updated_at = Utc::now();
        let balance_after = user.balance_trx;

        inner.push_transaction(
            user_id,
            TransactionKind::Deposit,
            trx_amount,
            balance_after,
            external_ref,
            &format!("{currency} deposit: {amount} -> {trx_amount} TRX"),
        );
        Ok(true)
    }

    async fn record_completion(&self, user_id: i64, cost: Decimal) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(user_id);
        user.total_orders += 1;
        user.total_spent += cost;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn transactions(&self, user_id: i64, limit: i64) -> Result<Vec<BalanceTransaction>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&id).cloned())
    }

    async fn list(
        &self,
        user_id: Option<i64>,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| user_id.map_or(true, |u| o.user_id == u))
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(orders
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn pending_batch(&self, limit: i64) -> Result<Vec<Order>> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        orders.truncate(limit.max(0) as usize);
        Ok(orders)
    }

    async fn begin_processing(&self, id: Uuid, supplier_address: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Processing;
                order.supplier_address = Some(supplier_address.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(&self, id: Uuid, tx_hash: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Processing => {
                order.status = OrderStatus::Completed;
                order.tx_hash = Some(tx_hash.to_string());
                order.completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail(&self, id: Uuid, message: &str, from: OrderStatus) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = OrderStatus::Failed;
                order.error_message = Some(message.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel(&self, id: Uuid, from: OrderStatus) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = OrderStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl SupplierStore for MemoryStore {
    async fn upsert(&self, supplier: &SupplierAccount) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .suppliers
            .insert(supplier.address.clone(), supplier.clone());
        Ok(())
    }

    async fn get(&self, address: &str) -> Result<Option<SupplierAccount>> {
        let inner = self.inner.lock().await;
        Ok(inner.suppliers.get(address).cloned())
    }

    async fn list_active(&self) -> Result<Vec<SupplierAccount>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .suppliers
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<SupplierAccount>> {
        let inner = self.inner.lock().await;
        let mut suppliers: Vec<SupplierAccount> = inner.suppliers.values().cloned().collect();
        suppliers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(suppliers)
    }

    async fn set_active(&self, address: &str, active: bool) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.suppliers.get_mut(address) {
            Some(supplier) => {
                supplier.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_capacity(
        &self,
        address: &str,
        snapshot: &AccountSnapshot,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(supplier) = inner.suppliers.get_mut(address) {
            supplier.trx_balance = snapshot.trx_balance;
            supplier.energy_available = snapshot.energy_available();
            supplier.energy_limit = snapshot.energy_limit;
            supplier.bandwidth_available = snapshot.bandwidth_available;
            supplier.last_checked = Some(checked_at);
        }
        Ok(())
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn list_wallets(&self, user_id: i64) -> Result<Vec<UserWallet>> {
        let inner = self.inner.lock().await;
        let mut wallets: Vec<UserWallet> = inner
            .wallets
            .iter()
            .filter(|w| w.user_id == user_id && w.is_active)
            .cloned()
            .collect();
        wallets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(wallets)
    }

    async fn add_wallet(&self, user_id: i64, address: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner
            .wallets
            .iter()
            .any(|w| w.user_id == user_id && w.address == address)
        {
            return Ok(false);
        }

        inner.user_mut(user_id);
        inner.next_wallet_id += 1;
        let mut wallet = UserWallet::new(user_id, address.to_string());
        wallet.id = Some(inner.next_wallet_id);
        inner.wallets.push(wallet);
        Ok(true)
    }

    async fn remove_wallet(&self, user_id: i64, address: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner
            .wallets
            .iter_mut()
            .find(|w| w.user_id == user_id && w.address == address && w.is_active)
        {
            Some(wallet) => {
                wallet.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn deduct_fails_closed_without_a_row() {
        let store = MemoryStore::new();
        assert!(!store.deduct(1, dec!(5), "o1", "charge").await.unwrap());
        assert!(!store.deduct(1, dec!(-5), "o1", "charge").await.unwrap());
        assert!(store.transactions(1, 10).await.unwrap().is_empty());
        assert_eq!(store.get_balance(1).await.unwrap().trx, Decimal::ZERO);
    }

    #[tokio::test]
    async fn cas_transitions_guard_state() {
        let store = MemoryStore::new();
        let order = Order::new(
            1,
            "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8".to_string(),
            100_000,
            crate::domain::RentalDuration::OneDay,
            dec!(0.8),
            30,
        );
        let id = order.id;
        store.insert(&order).await.unwrap();

        assert!(store.begin_processing(id, "TSupplier").await.unwrap());
        // Second attempt is a no-op
        assert!(!store.begin_processing(id, "TSupplier").await.unwrap());
        // Cannot expire once processing
        assert!(!store.expire(id).await.unwrap());
        // A pending-scoped failure cannot touch a processing order
        assert!(!store
            .fail(id, "stale failure", OrderStatus::Pending)
            .await
            .unwrap());
        assert!(store.complete(id, "txabc").await.unwrap());
        // Terminal orders refuse further transitions
        assert!(!store
            .fail(id, "late failure", OrderStatus::Processing)
            .await
            .unwrap());
        assert!(!store.cancel(id, OrderStatus::Processing).await.unwrap());
    }
}
