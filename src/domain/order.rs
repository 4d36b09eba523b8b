use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Rental duration options offered to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalDuration {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "14d")]
    FourteenDays,
}

impl RentalDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneHour => "1h",
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::SevenDays => "7d",
            Self::FourteenDays => "14d",
        }
    }

    /// Duration in whole hours, as stored on the order
    pub fn hours(&self) -> i32 {
        match self {
            Self::OneHour => 1,
            Self::OneDay => 24,
            Self::ThreeDays => 72,
            Self::SevenDays => 168,
            Self::FourteenDays => 336,
        }
    }

    /// Duration as a fraction of a day, used by the pricing formula
    pub fn fraction_of_day(&self) -> Decimal {
        match self {
            Self::OneHour => Decimal::ONE / Decimal::from(24),
            Self::OneDay => Decimal::ONE,
            Self::ThreeDays => Decimal::from(3),
            Self::SevenDays => Decimal::from(7),
            Self::FourteenDays => Decimal::from(14),
        }
    }
}

impl std::fmt::Display for RentalDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RentalDuration {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim() {
            "1h" => Ok(Self::OneHour),
            "1d" => Ok(Self::OneDay),
            "3d" => Ok(Self::ThreeDays),
            "7d" => Ok(Self::SevenDays),
            "14d" => Ok(Self::FourteenDays),
            _ => Err("invalid duration; expected 1h|1d|3d|7d|14d"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order created, waiting for fulfillment
    Pending,
    /// Supplier assigned, balance debited, delegation in flight
    Processing,
    /// Delegation confirmed on chain
    Completed,
    /// Fulfillment failed (business or chain error)
    Failed,
    /// Cancelled by the user
    Cancelled,
    /// Pending order passed its expiry without fulfillment
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired
        )
    }

    /// Cancellation is only allowed before the order reaches a terminal state
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            _ => Err("unknown order status"),
        }
    }
}

/// An energy rental order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: i64,
    pub receive_address: String,
    pub energy_amount: i64,
    pub duration_hours: i32,
    pub cost_trx: Decimal,
    pub status: OrderStatus,
    pub supplier_address: Option<String>,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Build a fresh pending order. Cost is computed once here and never
    /// recomputed afterwards.
    pub fn new(
        user_id: i64,
        receive_address: String,
        energy_amount: i64,
        duration: RentalDuration,
        cost_trx: Decimal,
        ttl_minutes: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            receive_address,
            energy_amount,
            duration_hours: duration.hours(),
            cost_trx,
            status: OrderStatus::Pending,
            supplier_address: None,
            tx_hash: None,
            error_message: None,
            retry_count: 0,
            expires_at: now + Duration::minutes(ttl_minutes),
            created_at: now,
            completed_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && self.expires_at < now
    }
}
