use async_trait::async_trait;
use rust_decimal_macros::dec;
use tracing::info;
use uuid::Uuid;

use super::{AccountSnapshot, DelegationOutcome, ResourceLedger};
use crate::domain::SupplierAccount;
use crate::error::Result;

/// Chain stand-in for dry-run mode: every delegation succeeds with a
/// synthetic transaction id and every supplier looks well funded. Selected
/// explicitly through configuration, never as a silent fallback.
#[derive(Debug, Clone, Default)]
pub struct DryRunLedger;

#[async_trait]
impl ResourceLedger for DryRunLedger {
    async fn delegate(
        &self,
        supplier: &SupplierAccount,
        receive_address: &str,
        energy_amount: i64,
        duration_hours: i32,
    ) -> Result<DelegationOutcome> {
        let tx_id = format!("dryrun-{}", Uuid::new_v4().simple());
        info!(
            supplier = %supplier.address,
            %receive_address,
            energy_amount,
            duration_hours,
            %tx_id,
            "dry-run delegation (no on-chain effect)"
        );
        Ok(DelegationOutcome::confirmed(tx_id))
    }

    async fn account_snapshot(&self, _address: &str) -> Result<Option<AccountSnapshot>> {
        Ok(Some(AccountSnapshot {
            trx_balance: dec!(2000),
            energy_limit: 10_000_000,
            energy_used: 0,
            bandwidth_available: 5_000,
        }))
    }
}
