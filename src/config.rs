//! Immutable engine configuration, injected at construction time.
//!
//! Network endpoints and payment-token contract addresses are plain data here
//! rather than ambient globals; every adapter receives the registry it needs
//! when it is built.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::{Address, Currency};

/// RPC endpoint and deployed payment-token contracts for one network.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Payment-token contract addresses on this network, by currency.
    /// Native coins have no entry.
    #[serde(default)]
    pub token_contracts: HashMap<Currency, Address>,
}

/// Static registry of supported networks, keyed by network id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainRegistry {
    networks: HashMap<u64, NetworkConfig>,
}

impl ChainRegistry {
    pub fn new(networks: HashMap<u64, NetworkConfig>) -> Self {
        Self { networks }
    }

    /// Looks up a network. An unknown id is a configuration error.
    pub fn network(&self, network_id: u64) -> Result<&NetworkConfig> {
        self.networks
            .get(&network_id)
            .with_context(|| format!("network {network_id} is not configured"))
    }

    /// Address of the deployed `currency` token contract on `network_id`.
    pub fn token_contract(&self, network_id: u64, currency: Currency) -> Result<&Address> {
        self.network(network_id)?
            .token_contracts
            .get(&currency)
            .with_context(|| {
                format!(
                    "no {} token contract configured for network {network_id}",
                    currency.as_str()
                )
            })
    }
}

/// Settings for the external USD price-conversion service.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceServiceConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for the JSON-RPC chain transport.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainClientConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChainClientConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_retry_attempts() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    10
}
