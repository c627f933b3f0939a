//! JSON-RPC implementation of the chain transport with retry logic.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument};

use crate::chain::ChainQuery;
use crate::config::{ChainClientConfig, ChainRegistry};

/// Chain transport that POSTs read calls to the provider registered for the
/// target network.
pub struct JsonRpcChainQuery {
    client: Client,
    registry: ChainRegistry,
    retry_attempts: usize,
}

impl JsonRpcChainQuery {
    pub fn new(registry: ChainRegistry, config: ChainClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build chain HTTP client")?;

        Ok(Self {
            client,
            registry,
            retry_attempts: config.retry_attempts,
        })
    }

    async fn call_once(
        &self,
        rpc_url: &str,
        contract_address: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "contract_call",
            "params": {
                "to": contract_address,
                "method": method,
                "args": args,
            },
        });

        let response = self
            .client
            .post(rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("chain call {method} to {contract_address} failed"))?;

        let payload: Value = response
            .json()
            .await
            .context("chain call returned a non-JSON response")?;

        if let Some(error) = payload.get("error") {
            return Err(anyhow!("chain call {method} returned an error: {error}"));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("chain call {method} response has no result"))
    }
}

#[async_trait]
impl ChainQuery for JsonRpcChainQuery {
    #[instrument(skip(self, args))]
    async fn call_read_method(
        &self,
        network_id: u64,
        contract_address: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Value> {
        let network = self.registry.network(network_id)?;
        debug!(rpc_url = %network.rpc_url, "issuing read call");

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .take(self.retry_attempts);

        Retry::spawn(retry_strategy, || {
            self.call_once(&network.rpc_url, contract_address, method, args)
        })
        .await
    }
}
