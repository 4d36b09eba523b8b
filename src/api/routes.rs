use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Order endpoints
        .route("/api/orders", post(handlers::create_order))
        .route("/api/orders", get(handlers::list_orders))
        .route("/api/orders/:id", get(handlers::get_order))
        .route("/api/orders/:id/cancel", post(handlers::cancel_order))
        // Balance endpoints
        .route("/api/users/:id/balance", get(handlers::get_balance))
        .route("/api/users/:id/deposit", post(handlers::confirm_deposit))
        .route("/api/users/:id/deduct", post(handlers::deduct_balance))
        .route("/api/users/:id/refund", post(handlers::refund_balance))
        .route(
            "/api/users/:id/transactions",
            get(handlers::list_transactions),
        )
        // Wallet endpoints
        .route("/api/users/:id/wallets", get(handlers::list_wallets))
        .route("/api/users/:id/wallets", post(handlers::add_wallet))
        .route(
            "/api/users/:id/wallets/:address",
            delete(handlers::remove_wallet),
        )
        // Supplier endpoints (admin)
        .route("/api/suppliers", post(handlers::register_supplier))
        .route("/api/suppliers", get(handlers::list_suppliers))
        // Health
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(cors)
}
