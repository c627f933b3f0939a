//! Shared fixtures: mock chain and price adapters plus a wired engine stack
//! over an in-memory database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use presale_engine::chain::{ChainQuery, PresaleStateReader};
use presale_engine::config::{ChainRegistry, NetworkConfig};
use presale_engine::engine::{
    CampaignService, EligibilityEngine, LifecycleClassifier, StatisticsAggregator,
};
use presale_engine::pricing::PriceLookup;
use presale_engine::storage::{CampaignStore, SqliteCampaignStore};
use presale_engine::types::{AccessType, CampaignDraft, Currency};

pub const NETWORK_ID: u64 = 1;
pub const USDT_CONTRACT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
pub const BUSD_CONTRACT: &str = "0xe9e7cea3dedca5984780bafc599bd69add087d56";

/// Chain transport fed from canned per-(contract, method) responses.
/// A missing response behaves like a transport failure.
pub struct MockChain {
    responses: Mutex<HashMap<(String, String), Value>>,
    status_calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            status_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_response(&self, contract: &str, method: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert((contract.to_lowercase(), method.to_string()), value);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainQuery for MockChain {
    async fn call_read_method(
        &self,
        _network_id: u64,
        contract_address: &str,
        method: &str,
        _args: &[Value],
    ) -> Result<Value> {
        if method == "STATUS" {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.responses
            .lock()
            .unwrap()
            .get(&(contract_address.to_lowercase(), method.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("no response wired for {contract_address} {method}"))
    }
}

/// Contract `STATUS()` payload with the given totals.
pub fn status_payload(total_base_collected: &str, number_buyers: u64) -> Value {
    json!({
        "TOTAL_BASE_COLLECTED": total_base_collected,
        "TOTAL_TOKENS_SOLD": "0",
        "TOTAL_BASE_WITHDRAWN": "0",
        "TOTAL_TOKENS_WITHDRAWN": "0",
        "NUM_BUYERS": number_buyers.to_string(),
        "ADDED_LIQUIDITY": false,
        "FORCE_FAILED": false,
        "IS_TRANSFERED_FEE": false,
        "LIST_ON_UNISWAP": false,
        "IS_OWNER_WITHDRAWN": false,
        "WHITELIST_ONLY": false,
    })
}

pub fn buyer_payload(base_deposited: &str) -> Value {
    json!({
        "baseDeposited": base_deposited,
        "tokensOwed": "0",
    })
}

/// Price lookup returning a fixed USD quote per currency. Zero amounts
/// resolve to zero without counting as a call.
pub struct MockPrice {
    quotes: Mutex<HashMap<Currency, BigDecimal>>,
    calls: AtomicUsize,
}

impl MockPrice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            quotes: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_quote(&self, currency: Currency, quote: &str) {
        self.quotes
            .lock()
            .unwrap()
            .insert(currency, quote.parse().unwrap());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceLookup for MockPrice {
    async fn price_of(&self, currency: Currency, amount: &BigDecimal) -> Result<BigDecimal> {
        if amount.is_zero() {
            return Ok(BigDecimal::zero());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .quotes
            .lock()
            .unwrap()
            .get(&currency)
            .cloned()
            .unwrap_or_else(BigDecimal::zero))
    }
}

pub fn registry() -> ChainRegistry {
    let mut token_contracts = HashMap::new();
    token_contracts.insert(Currency::Usdt, USDT_CONTRACT.to_string());
    token_contracts.insert(Currency::Busd, BUSD_CONTRACT.to_string());

    ChainRegistry::new(HashMap::from([(
        NETWORK_ID,
        NetworkConfig {
            rpc_url: "http://localhost:8545".to_string(),
            token_contracts,
        },
    )]))
}

/// The whole engine stack wired over mocks and an in-memory database.
pub struct Harness {
    pub store: Arc<SqliteCampaignStore>,
    pub chain: Arc<MockChain>,
    pub price: Arc<MockPrice>,
    pub reader: Arc<PresaleStateReader>,
    pub classifier: Arc<LifecycleClassifier>,
    pub eligibility: EligibilityEngine,
    pub campaigns: CampaignService,
    pub stats: StatisticsAggregator,
}

impl Harness {
    pub async fn new() -> Self {
        // Multiple tests race to install the subscriber; only the first wins.
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .try_init();

        let store = SqliteCampaignStore::new_in_memory()
            .await
            .expect("in-memory store");
        let chain = MockChain::new();
        let price = MockPrice::new();
        let store_dyn: Arc<dyn CampaignStore> = store.clone();
        let chain_dyn: Arc<dyn ChainQuery> = chain.clone();
        let reader = Arc::new(PresaleStateReader::new(chain_dyn));
        let classifier = Arc::new(LifecycleClassifier::new(
            reader.clone(),
            store_dyn.clone(),
            price.clone(),
        ));
        let eligibility = EligibilityEngine::new(reader.clone(), store_dyn.clone(), registry());
        let campaigns = CampaignService::new(store_dyn.clone(), classifier.clone(), reader.clone());
        let stats = StatisticsAggregator::new(store_dyn, classifier.clone());

        Self {
            store,
            chain,
            price,
            reader,
            classifier,
            eligibility,
            campaigns,
            stats,
        }
    }
}

/// Draft for a public campaign that is currently live.
pub fn live_draft(contract_address: &str, currency: Currency) -> CampaignDraft {
    draft_with_window(
        contract_address,
        currency,
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::hours(1),
    )
}

pub fn draft_with_window(
    contract_address: &str,
    currency: Currency,
    sale_start_time: DateTime<Utc>,
    sale_end_time: DateTime<Utc>,
) -> CampaignDraft {
    CampaignDraft {
        wallet_address: "0x1111111111111111111111111111111111111111".to_string(),
        network_id: NETWORK_ID,
        contract_address: contract_address.to_string(),
        token_contract_address: format!("{contract_address}-token"),
        payment_currency: currency,
        hard_cap: "1000".parse().unwrap(),
        soft_cap: "100".parse().unwrap(),
        max_allocation_wallet: None,
        min_allocation_wallet: None,
        access_type: AccessType::Public,
        sale_start_time,
        sale_end_time,
        listing: None,
    }
}
