use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{AccountSnapshot, DelegationOutcome, ResourceLedger};
use crate::domain::SupplierAccount;
use crate::error::{ErgonError, Result};

const SUN_PER_TRX: i64 = 1_000_000;
/// TRON produces a block every 3 seconds
const BLOCKS_PER_HOUR: i64 = 1_200;

/// HTTP client for a TronGrid-compatible node
#[derive(Clone)]
pub struct TronGridClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl TronGridClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn post(&self, endpoint: &str, payload: Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        debug!(%url, "chain node request");

        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("TRON-PRO-API-KEY", key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ErgonError::ChainUnavailable(format!(
                "{} returned {}",
                endpoint,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ResourceLedger for TronGridClient {
    async fn delegate(
        &self,
        supplier: &SupplierAccount,
        receive_address: &str,
        energy_amount: i64,
        duration_hours: i32,
    ) -> Result<DelegationOutcome> {
        let payload = json!({
            "owner_address": supplier.address,
            "receiver_address": receive_address,
            "balance": energy_amount,
            "resource": "ENERGY",
            "lock": true,
            "lock_period": i64::from(duration_hours) * BLOCKS_PER_HOUR,
            "visible": true,
        });

        let body = self.post("wallet/delegateresource", payload).await?;

        // Node-level rejections come back as {"Error": ...} or
        // {"result": {"code": ..., "message": ...}}
        if let Some(err) = body.get("Error").and_then(Value::as_str) {
            return Ok(DelegationOutcome::rejected(err.to_string()));
        }

        if body.get("result").and_then(Value::as_bool) == Some(true) {
            let tx_id = body
                .get("txid")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ErgonError::Delegation("node reported success without a txid".to_string())
                })?;
            return Ok(DelegationOutcome::confirmed(tx_id));
        }

        let message = body
            .pointer("/result/message")
            .or_else(|| body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("delegation rejected by node")
            .to_string();

        warn!(supplier = %supplier.address, %message, "delegation rejected");
        Ok(DelegationOutcome::rejected(message))
    }

    async fn account_snapshot(&self, address: &str) -> Result<Option<AccountSnapshot>> {
        let account = self
            .post("wallet/getaccount", json!({ "address": address, "visible": true }))
            .await?;

        // An unknown account comes back as an empty object
        if account.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            return Ok(None);
        }

        let balance_sun = account.get("balance").and_then(Value::as_i64).unwrap_or(0);

        let resources = self
            .post(
                "wallet/getaccountresource",
                json!({ "address": address, "visible": true }),
            )
            .await?;

        let energy_limit = resources
            .get("EnergyLimit")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let energy_used = resources
            .get("EnergyUsed")
            .and_then(Value::as_i64)
            .unwrap_or(0);

        let free_net = resources.get("freeNetLimit").and_then(Value::as_i64).unwrap_or(0)
            - resources.get("freeNetUsed").and_then(Value::as_i64).unwrap_or(0);
        let staked_net = resources.get("NetLimit").and_then(Value::as_i64).unwrap_or(0)
            - resources.get("NetUsed").and_then(Value::as_i64).unwrap_or(0);

        Ok(Some(AccountSnapshot {
            trx_balance: Decimal::from(balance_sun) / Decimal::from(SUN_PER_TRX),
            energy_limit,
            energy_used,
            bandwidth_available: (free_net + staked_net).max(0),
        }))
    }
}
