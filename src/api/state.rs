use std::sync::Arc;

use crate::engine::FulfillmentEngine;
use crate::pool::SupplierPool;
use crate::storage::{Ledger, OrderStore, SupplierStore, WalletStore};

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FulfillmentEngine>,
    pub orders: Arc<dyn OrderStore>,
    pub ledger: Arc<dyn Ledger>,
    pub wallets: Arc<dyn WalletStore>,
    pub suppliers: Arc<dyn SupplierStore>,
    pub pool: Arc<SupplierPool>,
}
