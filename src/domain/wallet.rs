use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A receiving address saved by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWallet {
    pub id: Option<i32>,
    pub user_id: i64,
    pub address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserWallet {
    pub fn new(user_id: i64, address: String) -> Self {
        Self {
            id: None,
            user_id,
            address,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// TRON address shape check: base58check addresses start with `T` and are
/// 34 characters; hex addresses are 42 characters prefixed with `41`.
pub fn is_valid_tron_address(address: &str) -> bool {
    if address.len() == 34 && address.starts_with('T') {
        address.chars().all(|c| c.is_ascii_alphanumeric())
    } else if address.len() == 42 && address.starts_with("41") {
        address.chars().all(|c| c.is_ascii_hexdigit())
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_base58_form() {
        assert!(is_valid_tron_address("TJRabPrwbZy45sbavfcjinPJC18kjpRTv8"));
    }

    #[test]
    fn accepts_hex_form() {
        assert!(is_valid_tron_address(
            "41a614f803b6fd780986a42c78ec9c7f77e6ded13c"
        ));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_tron_address(""));
        assert!(!is_valid_tron_address("T123"));
        assert!(!is_valid_tron_address("0xa614f803b6fd780986a42c78ec9c7f77e6ded13c"));
        assert!(!is_valid_tron_address("TJRabPrwbZy45sbavfcjinPJC18kjpRTv8XX"));
    }
}
