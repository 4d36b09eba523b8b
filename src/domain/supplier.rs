use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Minimum TRX a supplier must keep free for transaction fees. A supplier
/// at or below this reserve is never selected.
pub const FEE_RESERVE_TRX: Decimal = rust_decimal_macros::dec!(10);

/// A supplier-side account holding spare energy capacity. Capacity figures
/// are refreshed out of band from the chain; selection reads them
/// optimistically and is not locally decremented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierAccount {
    pub address: String,
    /// Encrypted signing credential, carried opaquely; decryption happens
    /// in the chain client, outside this crate's accounting core.
    #[serde(skip_serializing)]
    pub credential_blob: String,
    pub trx_balance: Decimal,
    pub energy_available: i64,
    pub energy_limit: i64,
    pub bandwidth_available: i64,
    pub is_active: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SupplierAccount {
    pub fn new(address: String, credential_blob: String) -> Self {
        Self {
            address,
            credential_blob,
            trx_balance: Decimal::ZERO,
            energy_available: 0,
            energy_limit: 0,
            bandwidth_available: 0,
            is_active: true,
            last_checked: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this supplier can serve an order of the given size
    pub fn can_serve(&self, required_energy: i64) -> bool {
        self.is_active
            && self.trx_balance > FEE_RESERVE_TRX
            && self.energy_available >= required_energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn supplier(balance: Decimal, energy: i64, active: bool) -> SupplierAccount {
        let mut s = SupplierAccount::new("TSupplier".to_string(), "blob".to_string());
        s.trx_balance = balance;
        s.energy_available = energy;
        s.is_active = active;
        s
    }

    #[test]
    fn can_serve_requires_active_flag() {
        assert!(supplier(dec!(100), 500_000, true).can_serve(200_000));
        assert!(!supplier(dec!(100), 500_000, false).can_serve(200_000));
    }

    #[test]
    fn can_serve_enforces_fee_reserve() {
        assert!(!supplier(dec!(10), 500_000, true).can_serve(200_000));
        assert!(supplier(dec!(10.000001), 500_000, true).can_serve(200_000));
    }

    #[test]
    fn can_serve_checks_capacity() {
        assert!(!supplier(dec!(100), 150_000, true).can_serve(200_000));
    }
}
