mod dry_run;
mod tron;

pub use dry_run::DryRunLedger;
pub use tron::TronGridClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::SupplierAccount;
use crate::error::Result;

/// Outcome of a delegation attempt. `success: false` carries the node's
/// message; transport-level failures surface as `Err` from the call itself
/// and are treated identically by the fulfillment engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationOutcome {
    pub success: bool,
    pub tx_id: Option<String>,
    pub message: Option<String>,
}

impl DelegationOutcome {
    pub fn confirmed(tx_id: String) -> Self {
        Self {
            success: true,
            tx_id: Some(tx_id),
            message: None,
        }
    }

    pub fn rejected(message: String) -> Self {
        Self {
            success: false,
            tx_id: None,
            message: Some(message),
        }
    }
}

/// Point-in-time view of a supplier account on chain
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub trx_balance: Decimal,
    pub energy_limit: i64,
    pub energy_used: i64,
    pub bandwidth_available: i64,
}

impl AccountSnapshot {
    pub fn energy_available(&self) -> i64 {
        (self.energy_limit - self.energy_used).max(0)
    }
}

/// The external blockchain collaborator. Delegation is the single
/// non-idempotent side effect in the system; implementations must bound
/// the call with a timeout.
#[async_trait]
pub trait ResourceLedger: Send + Sync {
    /// Delegate energy from a supplier account to a receiving address
    async fn delegate(
        &self,
        supplier: &SupplierAccount,
        receive_address: &str,
        energy_amount: i64,
        duration_hours: i32,
    ) -> Result<DelegationOutcome>;

    /// Read a supplier's current balance and resource figures.
    /// `Ok(None)` means the account is unknown to the node.
    async fn account_snapshot(&self, address: &str) -> Result<Option<AccountSnapshot>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn snapshot_energy_available_never_negative() {
        let snap = AccountSnapshot {
            trx_balance: dec!(100),
            energy_limit: 50_000,
            energy_used: 80_000,
            bandwidth_available: 0,
        };
        assert_eq!(snap.energy_available(), 0);
    }

    #[test]
    fn outcome_constructors() {
        let ok = DelegationOutcome::confirmed("abc123".to_string());
        assert!(ok.success);
        assert_eq!(ok.tx_id.as_deref(), Some("abc123"));

        let bad = DelegationOutcome::rejected("CONTRACT_VALIDATE_ERROR".to_string());
        assert!(!bad.success);
        assert!(bad.tx_id.is_none());
    }
}
