use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chain::ResourceLedger;
use crate::domain::{
    is_valid_tron_address, rental_cost, Order, OrderStatus, RentalDuration, MAX_ENERGY_AMOUNT,
    MIN_ENERGY_AMOUNT,
};
use crate::error::{ErgonError, Result};
use crate::pool::SupplierPool;
use crate::storage::{Ledger, OrderStore};

/// The order lifecycle state machine: cost calculation, balance check,
/// supplier selection, the single delegation attempt, and outcome
/// reconciliation back into the ledger.
///
/// Failure policy: once an order has been debited, any delegation outcome
/// that is not a confirmed success refunds the user ("assume money-back
/// unless proof of success"). A success response lost in transit can
/// therefore pay the user back for a delegation that landed on chain;
/// that bias is deliberate and documented.
pub struct FulfillmentEngine {
    orders: Arc<dyn OrderStore>,
    ledger: Arc<dyn Ledger>,
    pool: Arc<SupplierPool>,
    chain: Arc<dyn ResourceLedger>,
    trigger: Arc<Notify>,
    order_ttl_minutes: i64,
}

impl FulfillmentEngine {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        ledger: Arc<dyn Ledger>,
        pool: Arc<SupplierPool>,
        chain: Arc<dyn ResourceLedger>,
        order_ttl_minutes: i64,
    ) -> Self {
        Self {
            orders,
            ledger,
            pool,
            chain,
            trigger: Arc::new(Notify::new()),
            order_ttl_minutes,
        }
    }

    /// Notified whenever a new order wants immediate fulfillment. The
    /// sweep interval remains the durability backstop; nothing depends on
    /// this signal being observed.
    pub fn fulfillment_trigger(&self) -> Arc<Notify> {
        Arc::clone(&self.trigger)
    }

    /// Validate, price, and persist a new pending order. No funds move
    /// here; the balance check only rejects orders that could never be
    /// paid for at current balance.
    pub async fn create_order(
        &self,
        user_id: i64,
        energy_amount: i64,
        duration: RentalDuration,
        receive_address: &str,
    ) -> Result<Order> {
        if !(MIN_ENERGY_AMOUNT..=MAX_ENERGY_AMOUNT).contains(&energy_amount) {
            return Err(ErgonError::Validation(format!(
                "energy_amount must be between {MIN_ENERGY_AMOUNT} and {MAX_ENERGY_AMOUNT}"
            )));
        }
        if !is_valid_tron_address(receive_address) {
            return Err(ErgonError::Validation(
                "receive_address is not a valid TRON address".to_string(),
            ));
        }

        let balances = self.ledger.get_balance(user_id).await?;
        let cost = rental_cost(energy_amount, duration);
        if balances.trx < cost {
            return Err(ErgonError::InsufficientBalance {
                required: cost,
                available: balances.trx,
            });
        }

        let order = Order::new(
            user_id,
            receive_address.to_string(),
            energy_amount,
            duration,
            cost,
            self.order_ttl_minutes,
        );
        self.orders.insert(&order).await?;

        info!(order_id = %order.id, user_id, energy_amount, %cost, "order created");

        // Fire-and-forget nudge to the sweeper
        self.trigger.notify_one();

        Ok(order)
    }

    /// Drive one order from pending to a terminal or in-flight outcome.
    /// Safe to invoke concurrently and repeatedly for the same id: the
    /// pending guard makes every invocation after the first a no-op,
    /// reported as `Ok(None)`.
    pub async fn fulfill(&self, order_id: Uuid) -> Result<Option<Order>> {
        let order = match self.orders.get(order_id).await? {
            Some(order) if order.status == OrderStatus::Pending => order,
            Some(_) | None => return Ok(None),
        };

        // Supplier selection happens before any money moves, so a dry
        // pool fails the order without touching the ledger.
        let supplier = match self.pool.select(order.energy_amount).await? {
            Some(supplier) => supplier,
            None => {
                info!(order_id = %order.id, "no available supplier capacity");
                // Pending-only: if a concurrent attempt won the
                // processing transition since our read, it owns the
                // order and this failure must not land on it.
                if self
                    .orders
                    .fail(order.id, "no available supplier capacity", OrderStatus::Pending)
                    .await?
                {
                    return self.orders.get(order.id).await;
                }
                return Ok(None);
            }
        };

        // The processing transition is the atomicity point: whoever wins
        // this compare-and-swap owns the debit and the delegation attempt.
        if !self
            .orders
            .begin_processing(order.id, &supplier.address)
            .await?
        {
            return Ok(None);
        }

        let reference = order.id.to_string();
        let debited = self
            .ledger
            .deduct(
                order.user_id,
                order.cost_trx,
                &reference,
                "energy rental charge",
            )
            .await?;
        if !debited {
            info!(order_id = %order.id, "insufficient balance at fulfillment time");
            self.orders
                .fail(
                    order.id,
                    "insufficient balance at fulfillment time",
                    OrderStatus::Processing,
                )
                .await?;
            return self.orders.get(order.id).await;
        }

        match self
            .chain
            .delegate(
                &supplier,
                &order.receive_address,
                order.energy_amount,
                order.duration_hours,
            )
            .await
        {
            Ok(outcome) if outcome.success && outcome.tx_id.is_some() => {
                let tx_id = outcome.tx_id.unwrap_or_default();
                // Stats only count completions that actually committed;
                // a cancellation can win this race and refund instead.
                if self.orders.complete(order.id, &tx_id).await? {
                    self.ledger
                        .record_completion(order.user_id, order.cost_trx)
                        .await?;
                    info!(order_id = %order.id, %tx_id, "delegation completed");
                }
            }
            Ok(outcome) => {
                let message = outcome
                    .message
                    .unwrap_or_else(|| "delegation rejected".to_string());
                self.fail_and_refund(&order, &message, "delegation failure refund")
                    .await?;
            }
            Err(e) => {
                // Transport errors and timeouts are indistinguishable
                // from rejection here; both take the refund path.
                self.fail_and_refund(
                    &order,
                    &format!("delegation error: {e}"),
                    "delegation error refund",
                )
                .await?;
            }
        }

        self.orders.get(order.id).await
    }

    /// Cancel an order. Pending orders were never debited, so they just
    /// flip to cancelled; processing orders get their cost refunded.
    /// Terminal orders cannot be cancelled.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<bool> {
        let order = match self.orders.get(order_id).await? {
            Some(order) => order,
            None => return Ok(false),
        };

        match order.status {
            OrderStatus::Pending => {
                let cancelled = self.orders.cancel(order.id, OrderStatus::Pending).await?;
                if cancelled {
                    info!(order_id = %order.id, "pending order cancelled");
                }
                Ok(cancelled)
            }
            OrderStatus::Processing => {
                // Claim the transition first so a racing completion or
                // failure cannot stack a second refund on this order.
                let cancelled = self
                    .orders
                    .cancel(order.id, OrderStatus::Processing)
                    .await?;
                if cancelled {
                    self.ledger
                        .refund(
                            order.user_id,
                            order.cost_trx,
                            &order.id.to_string(),
                            "order cancellation refund",
                        )
                        .await?;
                    info!(order_id = %order.id, "processing order cancelled and refunded");
                }
                Ok(cancelled)
            }
            _ => Ok(false),
        }
    }

    async fn fail_and_refund(
        &self,
        order: &Order,
        message: &str,
        refund_reason: &str,
    ) -> Result<()> {
        warn!(order_id = %order.id, %message, "fulfillment failed, refunding");

        // The refund is issued only when the failed transition wins; a
        // lost race means a concurrent cancellation already settled the
        // order and its refund.
        let failed = self
            .orders
            .fail(order.id, message, OrderStatus::Processing)
            .await?;
        if failed {
            self.ledger
                .refund(
                    order.user_id,
                    order.cost_trx,
                    &order.id.to_string(),
                    refund_reason,
                )
                .await?;
        }
        Ok(())
    }

    /// Cost preview for a prospective order, without touching storage
    pub fn quote(&self, energy_amount: i64, duration: RentalDuration) -> Decimal {
        rental_cost(energy_amount, duration)
    }
}
