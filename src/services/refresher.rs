//! Periodic supplier capacity refresh

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::pool::SupplierPool;

/// Drives `SupplierPool::refresh_capacities` on a fixed interval so the
/// pool's optimistic capacity figures track the chain.
pub struct SupplierRefresher {
    pool: Arc<SupplierPool>,
    interval_secs: u64,
    running: Arc<AtomicBool>,
}

impl SupplierRefresher {
    pub fn new(pool: Arc<SupplierPool>, interval_secs: u64) -> Self {
        Self {
            pool,
            interval_secs,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(&self) -> JoinHandle<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("supplier refresher already running");
            return tokio::spawn(async {});
        }

        info!(
            interval_secs = self.interval_secs,
            "starting supplier capacity refresher"
        );

        let pool = Arc::clone(&self.pool);
        let interval_secs = self.interval_secs;
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));

            while running.load(Ordering::SeqCst) {
                interval.tick().await;

                if let Err(e) = pool.refresh_capacities().await {
                    error!(error = %e, "capacity refresh pass failed");
                }
            }

            info!("supplier refresher stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
