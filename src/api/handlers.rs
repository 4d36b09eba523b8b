use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::str::FromStr;
use uuid::Uuid;

use super::state::AppState;
use super::types::{
    AddWalletRequest, ApiError, ApiResponse, BalanceResponse, CreateOrderRequest, DeductRequest,
    DepositRequest, ListOrdersQuery, OrderResponse, RefundRequest, RegisterSupplierRequest,
    SupplierResponse, TransactionResponse, WalletResponse,
};
use crate::domain::{is_valid_tron_address, Currency, OrderStatus, RentalDuration};
use crate::error::ErgonError;

type ApiResult<T> = std::result::Result<T, ApiError>;

fn parse_order_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError(ErgonError::Validation(format!("invalid order id: {raw}"))))
}

// ==================== Orders ====================

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let duration = RentalDuration::from_str(&request.duration)
        .map_err(|e| ApiError(ErgonError::Validation(e.to_string())))?;

    let order = state
        .engine
        .create_order(
            request.user_id,
            request.energy_amount,
            duration,
            &request.receive_address,
        )
        .await?;

    Ok(Json(order.into()))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<OrderResponse>> {
    let id = parse_order_id(&order_id)?;
    let order = state
        .orders
        .get(id)
        .await?
        .ok_or(ApiError(ErgonError::OrderNotFound(order_id)))?;

    Ok(Json(order.into()))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<Json<Vec<OrderResponse>>> {
    let status = query
        .status
        .as_deref()
        .map(OrderStatus::from_str)
        .transpose()
        .map_err(|e| ApiError(ErgonError::Validation(e.to_string())))?;

    let orders = state
        .orders
        .list(query.user_id, status, query.limit.clamp(1, 500), query.offset.max(0))
        .await?;

    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<(StatusCode, Json<ApiResponse>)> {
    let id = parse_order_id(&order_id)?;

    if state.engine.cancel_order(id).await? {
        Ok((StatusCode::OK, Json(ApiResponse::ok("order cancelled"))))
    } else {
        Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("order cannot be cancelled")),
        ))
    }
}

// ==================== Balances ====================

pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<BalanceResponse>> {
    let balances = state.ledger.get_balance(user_id).await?;
    Ok(Json(BalanceResponse {
        user_id,
        balance_trx: balances.trx,
        balance_usdt: balances.usdt,
    }))
}

pub async fn confirm_deposit(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<DepositRequest>,
) -> ApiResult<Json<ApiResponse>> {
    let currency = Currency::from_str(&request.currency)
        .map_err(|e| ApiError(ErgonError::Validation(e.to_string())))?;

    let credited = state
        .ledger
        .confirm_deposit(user_id, &request.tx_hash, request.amount, currency)
        .await?;

    if credited {
        Ok(Json(ApiResponse::ok("deposit confirmed")))
    } else {
        Ok(Json(ApiResponse::fail("deposit already processed")))
    }
}

pub async fn deduct_balance(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<DeductRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse>)> {
    let description = request
        .description
        .unwrap_or_else(|| format!("order charge: {}", request.order_id));

    let debited = state
        .ledger
        .deduct(user_id, request.amount, &request.order_id, &description)
        .await?;

    if debited {
        Ok((StatusCode::OK, Json(ApiResponse::ok("balance deducted"))))
    } else {
        Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("insufficient balance")),
        ))
    }
}

pub async fn refund_balance(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<RefundRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse>)> {
    let reason = request
        .reason
        .unwrap_or_else(|| format!("order refund: {}", request.order_id));

    let refunded = state
        .ledger
        .refund(user_id, request.amount, &request.order_id, &reason)
        .await?;

    if refunded {
        Ok((StatusCode::OK, Json(ApiResponse::ok("balance refunded"))))
    } else {
        Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("refund amount must be positive")),
        ))
    }
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<TransactionResponse>>> {
    let transactions = state.ledger.transactions(user_id, 100).await?;
    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

// ==================== Wallets ====================

pub async fn list_wallets(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<WalletResponse>>> {
    let wallets = state.wallets.list_wallets(user_id).await?;
    Ok(Json(wallets.into_iter().map(Into::into).collect()))
}

pub async fn add_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<AddWalletRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse>)> {
    if !is_valid_tron_address(&request.address) {
        return Err(ApiError(ErgonError::Validation(
            "invalid TRON address format".to_string(),
        )));
    }

    if state.wallets.add_wallet(user_id, &request.address).await? {
        Ok((StatusCode::CREATED, Json(ApiResponse::ok("wallet added"))))
    } else {
        Ok((
            StatusCode::OK,
            Json(ApiResponse::fail("wallet already saved")),
        ))
    }
}

pub async fn remove_wallet(
    State(state): State<AppState>,
    Path((user_id, address)): Path<(i64, String)>,
) -> ApiResult<(StatusCode, Json<ApiResponse>)> {
    if state.wallets.remove_wallet(user_id, &address).await? {
        Ok((StatusCode::OK, Json(ApiResponse::ok("wallet removed"))))
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::fail("wallet not found")),
        ))
    }
}

// ==================== Suppliers ====================

pub async fn register_supplier(
    State(state): State<AppState>,
    Json(request): Json<RegisterSupplierRequest>,
) -> ApiResult<(StatusCode, Json<SupplierResponse>)> {
    if !is_valid_tron_address(&request.address) {
        return Err(ApiError(ErgonError::Validation(
            "invalid TRON address format".to_string(),
        )));
    }

    let supplier = state
        .pool
        .register(&request.address, &request.credential_blob)
        .await?;

    Ok((StatusCode::CREATED, Json(supplier.into())))
}

pub async fn list_suppliers(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SupplierResponse>>> {
    let suppliers = state.suppliers.list_all().await?;
    Ok(Json(suppliers.into_iter().map(Into::into).collect()))
}

// ==================== Health ====================

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
