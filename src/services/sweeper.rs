//! Pending-order sweep loop
//!
//! The durability backstop of the fulfillment path: every interval (or
//! sooner, when the engine signals a fresh order) it loads the oldest
//! pending orders, expires the stale ones, and drives the rest through
//! the engine one at a time with a pacing delay between attempts.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::FulfillmentEngine;
use crate::error::Result;
use crate::storage::OrderStore;

/// Configuration for the sweep loop
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,
    /// Maximum orders handled per sweep
    pub batch_size: u32,
    /// Pause between fulfillment attempts, milliseconds
    pub pacing_delay_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            batch_size: 10,
            pacing_delay_ms: 2_000,
        }
    }
}

/// Statistics for one sweep pass
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    pub fulfilled: usize,
    pub expired: usize,
    pub failed: usize,
}

pub struct Sweeper {
    engine: Arc<FulfillmentEngine>,
    orders: Arc<dyn OrderStore>,
    config: SweeperConfig,
    trigger: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl Sweeper {
    pub fn new(
        engine: Arc<FulfillmentEngine>,
        orders: Arc<dyn OrderStore>,
        config: SweeperConfig,
    ) -> Self {
        let trigger = engine.fulfillment_trigger();
        Self {
            engine,
            orders,
            config,
            trigger,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one sweep pass. Errors from a single order are logged and do
    /// not abort the rest of the batch.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let batch = self
            .orders
            .pending_batch(i64::from(self.config.batch_size))
            .await?;
        let mut report = SweepReport::default();

        for order in batch {
            // Expiry takes precedence: a stale pending order must never
            // reach the debit path, even via a late trigger.
            if order.is_expired(Utc::now()) {
                if self.orders.expire(order.id).await? {
                    info!(order_id = %order.id, "pending order expired");
                    report.expired += 1;
                }
                continue;
            }

            match self.engine.fulfill(order.id).await {
                Ok(Some(_)) => report.fulfilled += 1,
                Ok(None) => {} // raced with another fulfillment attempt
                Err(e) => {
                    error!(order_id = %order.id, error = %e, "fulfillment attempt failed");
                    report.failed += 1;
                }
            }

            // Pacing: avoid bursting the chain node
            tokio::time::sleep(tokio::time::Duration::from_millis(
                self.config.pacing_delay_ms,
            ))
            .await;
        }

        Ok(report)
    }

    /// Start the periodic sweep task. Wakes early whenever the engine
    /// signals a freshly created order.
    pub fn start(&self) -> JoinHandle<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("sweeper already running");
            return tokio::spawn(async {});
        }

        info!(
            interval_secs = self.config.interval_secs,
            batch_size = self.config.batch_size,
            "starting order sweeper"
        );

        let engine = Arc::clone(&self.engine);
        let orders = Arc::clone(&self.orders);
        let config = self.config.clone();
        let trigger = Arc::clone(&self.trigger);
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let sweeper = Sweeper {
                engine,
                orders,
                config: config.clone(),
                trigger: trigger.clone(),
                running: running.clone(),
            };

            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(config.interval_secs)) => {}
                    _ = trigger.notified() => {
                        debug!("sweep triggered by new order");
                    }
                }

                if !running.load(Ordering::SeqCst) {
                    break;
                }

                match sweeper.sweep().await {
                    Ok(report) => {
                        if report.fulfilled + report.expired + report.failed > 0 {
                            info!(
                                fulfilled = report.fulfilled,
                                expired = report.expired,
                                failed = report.failed,
                                "sweep complete"
                            );
                        }
                    }
                    Err(e) => error!(error = %e, "sweep pass failed"),
                }
            }

            info!("order sweeper stopped");
        })
    }

    /// Stop the periodic task after its current pass
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.trigger.notify_one();
    }
}
