use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::domain::{BalanceTransaction, Order, SupplierAccount, UserWallet};
use crate::error::ErgonError;

/// Generic success/failure envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Error wrapper that maps service errors onto HTTP statuses. Internal
/// details are logged, never leaked to the client.
pub struct ApiError(pub ErgonError);

impl From<ErgonError> for ApiError {
    fn from(err: ErgonError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ErgonError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ErgonError::InsufficientBalance { .. } => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            ErgonError::OrderNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("order not found: {id}"))
            }
            other => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

// ==================== Orders ====================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub energy_amount: i64,
    /// Wire form: 1h|1d|3d|7d|14d
    pub duration: String,
    pub receive_address: String,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: Option<i64>,
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// Order representation; monetary amounts go over the wire as strings
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: i64,
    pub receive_address: String,
    pub energy_amount: i64,
    pub duration_hours: i32,
    #[serde(with = "rust_decimal::serde::str")]
    pub cost_trx: Decimal,
    pub status: String,
    pub supplier_address: Option<String>,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id,
            receive_address: order.receive_address,
            energy_amount: order.energy_amount,
            duration_hours: order.duration_hours,
            cost_trx: order.cost_trx,
            status: order.status.as_str().to_string(),
            supplier_address: order.supplier_address,
            tx_hash: order.tx_hash,
            error_message: order.error_message,
            expires_at: order.expires_at,
            created_at: order.created_at,
            completed_at: order.completed_at,
        }
    }
}

// ==================== Balances ====================

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_trx: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_usdt: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct DeductRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub order_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub tx_hash: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// TRX or USDT
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub order_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub kind: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_after: Decimal,
    pub reference_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<BalanceTransaction> for TransactionResponse {
    fn from(tx: BalanceTransaction) -> Self {
        Self {
            kind: tx.kind.as_str().to_string(),
            amount: tx.amount,
            balance_after: tx.balance_after,
            reference_id: tx.reference_id,
            description: tx.description,
            created_at: tx.created_at,
        }
    }
}

// ==================== Wallets ====================

#[derive(Debug, Deserialize)]
pub struct AddWalletRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub id: Option<i32>,
    pub address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserWallet> for WalletResponse {
    fn from(wallet: UserWallet) -> Self {
        Self {
            id: wallet.id,
            address: wallet.address,
            is_active: wallet.is_active,
            created_at: wallet.created_at,
        }
    }
}

// ==================== Suppliers ====================

#[derive(Debug, Deserialize)]
pub struct RegisterSupplierRequest {
    pub address: String,
    pub credential_blob: String,
}

#[derive(Debug, Serialize)]
pub struct SupplierResponse {
    pub address: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub trx_balance: Decimal,
    pub energy_available: i64,
    pub energy_limit: i64,
    pub is_active: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

impl From<SupplierAccount> for SupplierResponse {
    fn from(supplier: SupplierAccount) -> Self {
        Self {
            address: supplier.address,
            trx_balance: supplier.trx_balance,
            energy_available: supplier.energy_available,
            energy_limit: supplier.energy_limit,
            is_active: supplier.is_active,
            last_checked: supplier.last_checked,
        }
    }
}
