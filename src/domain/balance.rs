use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Fixed published conversion rate: 1 TRX = 0.38826 USDT.
/// USDT deposits are converted to TRX at this rate on confirmation.
pub const USDT_PER_TRX: Decimal = rust_decimal_macros::dec!(0.38826);

/// Settlement currency for deposits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Trx,
    Usdt,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trx => "TRX",
            Self::Usdt => "USDT",
        }
    }
}

impl FromStr for Currency {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRX" => Ok(Self::Trx),
            "USDT" => Ok(Self::Usdt),
            _ => Err("unknown currency; expected TRX|USDT"),
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current balances for a user, both settlement currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Balances {
    #[serde(with = "rust_decimal::serde::str")]
    pub trx: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub usdt: Decimal,
}

/// A user account. Balances are only ever mutated through ledger
/// operations, never by direct field writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub balance_trx: Decimal,
    pub balance_usdt: Decimal,
    pub total_orders: i32,
    pub total_spent: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            balance_trx: Decimal::ZERO,
            balance_usdt: Decimal::ZERO,
            total_orders: 0,
            total_spent: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balances(&self) -> Balances {
        Balances {
            trx: self.balance_trx,
            usdt: self.balance_usdt,
        }
    }
}

/// Kind of balance movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Deduct,
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Deduct => "deduct",
            Self::Refund => "refund",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "deduct" => Ok(Self::Deduct),
            "refund" => Ok(Self::Refund),
            _ => Err("unknown transaction kind"),
        }
    }
}

/// One row of the append-only balance log. The signed `amount` convention
/// makes the reconciliation invariant a plain sum: deducts are negative,
/// deposits and refunds positive, and the running total equals the balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub id: Option<i64>,
    pub user_id: i64,
    pub kind: TransactionKind,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_after: Decimal,
    pub reference_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn currency_round_trips() {
        assert_eq!("trx".parse::<Currency>(), Ok(Currency::Trx));
        assert_eq!("USDT".parse::<Currency>(), Ok(Currency::Usdt));
        assert!("EUR".parse::<Currency>().is_err());
    }

    #[test]
    fn new_user_has_zero_balances() {
        let user = User::new(7);
        assert_eq!(user.balances().trx, Decimal::ZERO);
        assert_eq!(user.balances().usdt, Decimal::ZERO);
        assert_eq!(user.total_orders, 0);
    }

    #[test]
    fn usdt_rate_is_fixed() {
        assert_eq!(USDT_PER_TRX, dec!(0.38826));
    }
}
