//! Shared fixtures: in-memory store harness and a scriptable chain double

use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use ergon::chain::{AccountSnapshot, DelegationOutcome, ResourceLedger};
use ergon::domain::SupplierAccount;
use ergon::engine::FulfillmentEngine;
use ergon::pool::SupplierPool;
use ergon::storage::{MemoryStore, SupplierStore};
use ergon::Result;

pub const RECV_ADDR: &str = "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8";

/// Chain double whose delegation outcomes are scripted per call; calls
/// beyond the script succeed with a synthetic tx id.
pub struct ScriptedLedger {
    outcomes: Mutex<VecDeque<Result<DelegationOutcome>>>,
    pub delegations: Mutex<usize>,
}

impl ScriptedLedger {
    pub fn new(outcomes: Vec<Result<DelegationOutcome>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            delegations: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ResourceLedger for ScriptedLedger {
    async fn delegate(
        &self,
        _supplier: &SupplierAccount,
        _receive_address: &str,
        _energy_amount: i64,
        _duration_hours: i32,
    ) -> Result<DelegationOutcome> {
        *self.delegations.lock().await += 1;
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(DelegationOutcome::confirmed("tx-scripted".to_string())))
    }

    async fn account_snapshot(&self, _address: &str) -> Result<Option<AccountSnapshot>> {
        Ok(None)
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<FulfillmentEngine>,
    pub chain: Arc<ScriptedLedger>,
}

/// Engine over a memory store with one well-funded supplier
pub async fn harness(outcomes: Vec<Result<DelegationOutcome>>) -> Harness {
    harness_with_ttl(outcomes, 30).await
}

pub async fn harness_with_ttl(
    outcomes: Vec<Result<DelegationOutcome>>,
    ttl_minutes: i64,
) -> Harness {
    let store = Arc::new(MemoryStore::new());

    let mut supplier = SupplierAccount::new("TSupplierBig".to_string(), "blob".to_string());
    supplier.trx_balance = dec!(500);
    supplier.energy_available = 5_000_000;
    SupplierStore::upsert(store.as_ref(), &supplier)
        .await
        .unwrap();

    let chain = Arc::new(ScriptedLedger::new(outcomes));
    let chain_dyn: Arc<dyn ResourceLedger> = chain.clone();
    let pool = Arc::new(SupplierPool::new(store.clone(), chain_dyn.clone()));
    let engine = Arc::new(FulfillmentEngine::new(
        store.clone(),
        store.clone(),
        pool,
        chain_dyn,
        ttl_minutes,
    ));

    Harness {
        store,
        engine,
        chain,
    }
}
