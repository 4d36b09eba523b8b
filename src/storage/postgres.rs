use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{QueryBuilder, Row};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::{Ledger, OrderStore, SupplierStore, WalletStore};
use crate::chain::AccountSnapshot;
use crate::domain::{
    BalanceTransaction, Balances, Currency, Order, OrderStatus, SupplierAccount, TransactionKind,
    UserWallet, USDT_PER_TRX,
};
use crate::error::{ErgonError, Result};

/// PostgreSQL storage adapter; implements the ledger, order, supplier,
/// and wallet stores over one connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create the user row if it does not exist yet
async fn ensure_user(
    executor: &mut sqlx::PgConnection,
    user_id: i64,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(())
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status_str: String = row.get("status");
    let status = OrderStatus::from_str(&status_str)
        .map_err(|e| ErgonError::Internal(format!("bad order status '{status_str}': {e}")))?;

    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        receive_address: row.get("receive_address"),
        energy_amount: row.get("energy_amount"),
        duration_hours: row.get("duration_hours"),
        cost_trx: row.get("cost_trx"),
        status,
        supplier_address: row.get("supplier_address"),
        tx_hash: row.get("tx_hash"),
        error_message: row.get("error_message"),
        retry_count: row.get("retry_count"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

fn supplier_from_row(row: &PgRow) -> SupplierAccount {
    SupplierAccount {
        address: row.get("address"),
        credential_blob: row.get("credential_blob"),
        trx_balance: row.get("trx_balance"),
        energy_available: row.get("energy_available"),
        energy_limit: row.get("energy_limit"),
        bandwidth_available: row.get("bandwidth_available"),
        is_active: row.get("is_active"),
        last_checked: row.get("last_checked"),
        created_at: row.get("created_at"),
    }
}

fn transaction_from_row(row: &PgRow) -> Result<BalanceTransaction> {
    let kind_str: String = row.get("kind");
    let kind = TransactionKind::from_str(&kind_str)
        .map_err(|e| ErgonError::Internal(format!("bad transaction kind '{kind_str}': {e}")))?;

    Ok(BalanceTransaction {
        id: Some(row.get("id")),
        user_id: row.get("user_id"),
        kind,
        amount: row.get("amount"),
        balance_after: row.get("balance_after"),
        reference_id: row.get("reference_id"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl Ledger for PostgresStore {
    async fn get_balance(&self, user_id: i64) -> Result<Balances> {
        let mut conn = self.pool.acquire().await?;
        ensure_user(&mut conn, user_id).await?;

        let row = sqlx::query("SELECT balance_trx, balance_usdt FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(Balances {
            trx: row.get("balance_trx"),
            usdt: row.get("balance_usdt"),
        })
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

        let mut tx = self.pool.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        // Row lock serializes concurrent ledger operations per user
        let row = sqlx::query("SELECT balance_trx FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let balance: Decimal = row.get("balance_trx");

        if balance < amount {
            debug!(user_id, %amount, %balance, "deduct rejected: insufficient balance");
            return Ok(false);
        }

        let row = sqlx::query(
            r#"
            UPDATE users
            SET balance_trx = balance_trx - $2,
                total_spent = total_spent + $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING balance_trx
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;
        let balance_after: Decimal = row.get("balance_trx");

        sqlx::query(
            r#"
            INSERT INTO balance_transactions (user_id, kind, amount, balance_after, reference_id, description)
            VALUES ($1, 'deduct', $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(-amount)
        .bind(balance_after)
        .bind(reference_id)
        .bind(description)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
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

        let mut tx = self.pool.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        sqlx::query("SELECT balance_trx FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"
            UPDATE users
            SET balance_trx = balance_trx + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance_trx
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;
        let balance_after: Decimal = row.get("balance_trx");

        sqlx::query(
            r#"
            INSERT INTO balance_transactions (user_id, kind, amount, balance_after, reference_id, description)
            VALUES ($1, 'refund', $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(balance_after)
        .bind(reference_id)
        .bind(description)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
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

        let mut tx = self.pool.begin().await?;

        // Idempotency gate: a replayed deposit confirmation is a no-op
        let existing =
            sqlx::query("SELECT 1 FROM balance_transactions WHERE reference_id = $1 LIMIT 1")
                .bind(external_ref)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            debug!(user_id, external_ref, "deposit already confirmed");
            return Ok(false);
        }

        ensure_user(&mut tx, user_id).await?;

        sqlx::query("SELECT balance_trx FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        let trx_amount = match currency {
            Currency::Trx => amount,
            Currency::Usdt => amount / USDT_PER_TRX,
        };

        let row = sqlx::query(
            r#"
            UPDATE users
            SET balance_trx = balance_trx + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance_trx
            "#,
        )
        .bind(user_id)
        .bind(trx_amount)
        .fetch_one(&mut *tx)
        .await?;
        let balance_after: Decimal = row.get("balance_trx");

        let inserted = sqlx::query(
            r#"
            INSERT INTO balance_transactions (user_id, kind, amount, balance_after, reference_id, description)
            VALUES ($1, 'deposit', $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(trx_amount)
        .bind(balance_after)
        .bind(external_ref)
        .bind(format!("{currency} deposit: {amount} -> {trx_amount} TRX"))
        .execute(&mut *tx)
        .await;

        // Two concurrent confirmations can both pass the lookup above;
        // the partial unique index settles it and the loser rolls back
        // and reports a replay.
        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!(user_id, external_ref, "deposit confirmed concurrently");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        info!(user_id, external_ref, %trx_amount, "deposit confirmed");
        Ok(true)
    }

    async fn record_completion(&self, user_id: i64, cost: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET total_orders = total_orders + 1,
                total_spent = total_spent + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transactions(&self, user_id: i64, limit: i64) -> Result<Vec<BalanceTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, amount, balance_after, reference_id, description, created_at
            FROM balance_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, receive_address, energy_amount, duration_hours, cost_trx,
                 status, retry_count, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.receive_address)
        .bind(order.energy_amount)
        .bind(order.duration_hours)
        .bind(order.cost_trx)
        .bind(order.status.as_str())
        .bind(order.retry_count)
        .bind(order.expires_at)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn list(
        &self,
        user_id: Option<i64>,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>> {
        let mut builder = QueryBuilder::new("SELECT * FROM orders WHERE TRUE");

        if let Some(user_id) = user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn pending_batch(&self, limit: i64) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE status = 'pending' ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn begin_processing(&self, id: Uuid, supplier_address: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'processing', supplier_address = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(supplier_address)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete(&self, id: Uuid, tx_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'completed', tx_hash = $2, completed_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(tx_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail(&self, id: Uuid, message: &str, from: OrderStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'failed', error_message = $2
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(message)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel(&self, id: Uuid, from: OrderStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'cancelled' WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn expire(&self, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE orders SET status = 'expired' WHERE id = $1 AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SupplierStore for PostgresStore {
    async fn upsert(&self, supplier: &SupplierAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO supplier_wallets
                (address, credential_blob, trx_balance, energy_available, energy_limit,
                 bandwidth_available, is_active, last_checked, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (address) DO UPDATE SET
                credential_blob = EXCLUDED.credential_blob,
                is_active = TRUE
            "#,
        )
        .bind(&supplier.address)
        .bind(&supplier.credential_blob)
        .bind(supplier.trx_balance)
        .bind(supplier.energy_available)
        .bind(supplier.energy_limit)
        .bind(supplier.bandwidth_available)
        .bind(supplier.is_active)
        .bind(supplier.last_checked)
        .bind(supplier.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, address: &str) -> Result<Option<SupplierAccount>> {
        let row = sqlx::query("SELECT * FROM supplier_wallets WHERE address = $1")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(supplier_from_row))
    }

    async fn list_active(&self) -> Result<Vec<SupplierAccount>> {
        let rows = sqlx::query("SELECT * FROM supplier_wallets WHERE is_active = TRUE")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(supplier_from_row).collect())
    }

    async fn list_all(&self) -> Result<Vec<SupplierAccount>> {
        let rows = sqlx::query("SELECT * FROM supplier_wallets ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(supplier_from_row).collect())
    }

    async fn set_active(&self, address: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE supplier_wallets SET is_active = $2 WHERE address = $1")
            .bind(address)
            .bind(active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_capacity(
        &self,
        address: &str,
        snapshot: &AccountSnapshot,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE supplier_wallets
            SET trx_balance = $2,
                energy_available = $3,
                energy_limit = $4,
                bandwidth_available = $5,
                last_checked = $6
            WHERE address = $1
            "#,
        )
        .bind(address)
        .bind(snapshot.trx_balance)
        .bind(snapshot.energy_available())
        .bind(snapshot.energy_limit)
        .bind(snapshot.bandwidth_available)
        .bind(checked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WalletStore for PostgresStore {
    async fn list_wallets(&self, user_id: i64) -> Result<Vec<UserWallet>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, address, is_active, created_at
            FROM user_wallets
            WHERE user_id = $1 AND is_active = TRUE
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| UserWallet {
                id: Some(row.get("id")),
                user_id: row.get("user_id"),
                address: row.get("address"),
                is_active: row.get("is_active"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn add_wallet(&self, user_id: i64, address: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let existing =
            sqlx::query("SELECT 1 FROM user_wallets WHERE user_id = $1 AND address = $2 LIMIT 1")
                .bind(user_id)
                .bind(address)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Ok(false);
        }

        ensure_user(&mut tx, user_id).await?;

        sqlx::query("INSERT INTO user_wallets (user_id, address) VALUES ($1, $2)")
            .bind(user_id)
            .bind(address)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn remove_wallet(&self, user_id: i64, address: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_wallets
            SET is_active = FALSE
            WHERE user_id = $1 AND address = $2 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(address)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
