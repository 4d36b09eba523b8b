pub mod api;
pub mod chain;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod pool;
pub mod services;
pub mod storage;

pub use chain::{AccountSnapshot, DelegationOutcome, DryRunLedger, ResourceLedger, TronGridClient};
pub use config::AppConfig;
pub use domain::{
    rental_cost, Balances, Currency, Order, OrderStatus, RentalDuration, SupplierAccount,
};
pub use engine::FulfillmentEngine;
pub use error::{ErgonError, Result};
pub use pool::{RefreshReport, SupplierPool};
pub use services::{SupplierRefresher, Sweeper, SweeperConfig};
pub use storage::{Ledger, MemoryStore, OrderStore, PostgresStore, SupplierStore, WalletStore};
