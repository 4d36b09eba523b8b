use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::ResourceLedger;
use crate::domain::SupplierAccount;
use crate::error::{ErgonError, Result};
use crate::storage::SupplierStore;

/// Result of one capacity refresh pass
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub skipped: usize,
}

/// Tracks supplier accounts and picks one to serve an order. Capacity
/// figures are read optimistically: selection does not decrement them,
/// the next refresh re-reads truth from the chain.
pub struct SupplierPool {
    store: Arc<dyn SupplierStore>,
    chain: Arc<dyn ResourceLedger>,
}

impl SupplierPool {
    pub fn new(store: Arc<dyn SupplierStore>, chain: Arc<dyn ResourceLedger>) -> Self {
        Self { store, chain }
    }

    /// Pick the active supplier with the most available energy among
    /// those that can serve the request. `None` is an expected outcome
    /// (no capacity), not a fault.
    pub async fn select(&self, required_energy: i64) -> Result<Option<SupplierAccount>> {
        let candidates = self.store.list_active().await?;

        let best = candidates
            .into_iter()
            .filter(|s| s.can_serve(required_energy))
            .max_by_key(|s| s.energy_available);

        if let Some(supplier) = &best {
            debug!(
                supplier = %supplier.address,
                energy_available = supplier.energy_available,
                required_energy,
                "supplier selected"
            );
        }
        Ok(best)
    }

    /// Register a supplier account (or reactivate an existing one). The
    /// credential blob is stored as given; its encryption is handled
    /// upstream of this service.
    pub async fn register(&self, address: &str, credential_blob: &str) -> Result<SupplierAccount> {
        if address.is_empty() {
            return Err(ErgonError::Validation(
                "supplier address must not be empty".to_string(),
            ));
        }

        let supplier = SupplierAccount::new(address.to_string(), credential_blob.to_string());
        self.store.upsert(&supplier).await?;
        info!(%address, "supplier registered");

        Ok(self
            .store
            .get(address)
            .await?
            .unwrap_or(supplier))
    }

    /// Re-read every active supplier's balance and resource figures from
    /// the chain. A failed read skips that supplier for this round and
    /// never deactivates it.
    pub async fn refresh_capacities(&self) -> Result<RefreshReport> {
        let suppliers = self.store.list_active().await?;
        let mut report = RefreshReport::default();

        for supplier in suppliers {
            match self.chain.account_snapshot(&supplier.address).await {
                Ok(Some(snapshot)) => {
                    self.store
                        .update_capacity(&supplier.address, &snapshot, Utc::now())
                        .await?;
                    debug!(
                        supplier = %supplier.address,
                        trx_balance = %snapshot.trx_balance,
                        energy_available = snapshot.energy_available(),
                        "supplier capacity refreshed"
                    );
                    report.refreshed += 1;
                }
                Ok(None) => {
                    warn!(supplier = %supplier.address, "account not found on chain, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(supplier = %supplier.address, error = %e, "capacity refresh failed, skipping");
                    report.skipped += 1;
                }
            }
        }

        info!(
            refreshed = report.refreshed,
            skipped = report.skipped,
            "supplier capacity refresh complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::DryRunLedger;
    use crate::storage::MemoryStore;
    use rust_decimal_macros::dec;

    async fn seed(store: &MemoryStore, address: &str, energy: i64, active: bool) {
        let mut supplier = SupplierAccount::new(address.to_string(), "blob".to_string());
        supplier.trx_balance = dec!(500);
        supplier.energy_available = energy;
        supplier.is_active = active;
        SupplierStore::upsert(store, &supplier).await.unwrap();
    }

    #[tokio::test]
    async fn selects_largest_qualifying_supplier() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "TBig", 500_000, true).await;
        seed(&store, "TSmall", 150_000, true).await;
        seed(&store, "TDown", 0, false).await;

        let pool = SupplierPool::new(store, Arc::new(DryRunLedger));
        let picked = pool.select(200_000).await.unwrap().unwrap();
        assert_eq!(picked.address, "TBig");
    }

    #[tokio::test]
    async fn no_qualifying_supplier_is_none() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "TSmall", 150_000, true).await;

        let pool = SupplierPool::new(store, Arc::new(DryRunLedger));
        assert!(pool.select(200_000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_updates_capacity_from_chain() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "TBig", 0, true).await;

        let pool = SupplierPool::new(store.clone(), Arc::new(DryRunLedger));
        let report = pool.refresh_capacities().await.unwrap();
        assert_eq!(report.refreshed, 1);
        assert_eq!(report.skipped, 0);

        let supplier = SupplierStore::get(store.as_ref(), "TBig")
            .await
            .unwrap()
            .unwrap();
        assert!(supplier.energy_available > 0);
        assert!(supplier.last_checked.is_some());
    }
}
