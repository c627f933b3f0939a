//! Presale contract state reader.
//!
//! Pure read adapter: queries the contract's `STATUS()` and `BUYERS(address)`
//! views plus the ERC20 `balanceOf` interface, and maps transport failures
//! into typed `SYSTEM_ERROR` results at the service boundary.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::chain::ChainQuery;
use crate::types::{BuyerRecord, ErrorCode, OnChainSnapshot, ServiceResult};

pub struct PresaleStateReader {
    chain: Arc<dyn ChainQuery>,
}

impl PresaleStateReader {
    pub fn new(chain: Arc<dyn ChainQuery>) -> Self {
        Self { chain }
    }

    /// Boundary form of [`Self::fetch_status`]: never fails, any transport
    /// error becomes `SYSTEM_ERROR`.
    pub async fn read_status(
        &self,
        contract_address: &str,
        network_id: u64,
    ) -> ServiceResult<OnChainSnapshot> {
        match self.fetch_status(contract_address, network_id).await {
            Ok(snapshot) => ServiceResult::ok(snapshot),
            Err(cause) => {
                error!(contract_address, network_id, ?cause, "failed to read presale status");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    /// Boundary form of [`Self::fetch_buyer`].
    pub async fn read_buyer(
        &self,
        contract_address: &str,
        network_id: u64,
        wallet_address: &str,
    ) -> ServiceResult<BuyerRecord> {
        match self
            .fetch_buyer(contract_address, network_id, wallet_address)
            .await
        {
            Ok(buyer) => ServiceResult::ok(buyer),
            Err(cause) => {
                error!(contract_address, network_id, wallet_address, ?cause, "failed to read buyer record");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    /// Current status snapshot of a presale contract.
    #[instrument(skip(self))]
    pub async fn fetch_status(
        &self,
        contract_address: &str,
        network_id: u64,
    ) -> Result<OnChainSnapshot> {
        let value = self
            .chain
            .call_read_method(network_id, contract_address, "STATUS", &[])
            .await
            .context("presale STATUS call failed")?;

        parse_snapshot(&value)
    }

    /// Cumulative deposit record of one wallet.
    #[instrument(skip(self))]
    pub async fn fetch_buyer(
        &self,
        contract_address: &str,
        network_id: u64,
        wallet_address: &str,
    ) -> Result<BuyerRecord> {
        let value = self
            .chain
            .call_read_method(
                network_id,
                contract_address,
                "BUYERS",
                &[json!(wallet_address)],
            )
            .await
            .context("presale BUYERS call failed")?;

        Ok(BuyerRecord {
            base_deposited: text_field(&value, "baseDeposited")?,
            tokens_owed: text_field(&value, "tokensOwed")?,
        })
    }

    /// ERC20 `balanceOf` in base units, as a decimal string.
    #[instrument(skip(self))]
    pub async fn fetch_erc20_balance(
        &self,
        token_contract: &str,
        network_id: u64,
        wallet_address: &str,
    ) -> Result<String> {
        let value = self
            .chain
            .call_read_method(
                network_id,
                token_contract,
                "balanceOf",
                &[json!(wallet_address)],
            )
            .await
            .context("ERC20 balanceOf call failed")?;

        match value {
            Value::String(balance) => Ok(balance),
            Value::Number(balance) => Ok(balance.to_string()),
            other => Err(anyhow!("unexpected balanceOf response: {other}")),
        }
    }
}

fn parse_snapshot(value: &Value) -> Result<OnChainSnapshot> {
    Ok(OnChainSnapshot {
        total_base_collected: text_field(value, "TOTAL_BASE_COLLECTED")?,
        total_tokens_sold: text_field(value, "TOTAL_TOKENS_SOLD")?,
        total_base_withdrawn: text_field(value, "TOTAL_BASE_WITHDRAWN")?,
        total_tokens_withdrawn: text_field(value, "TOTAL_TOKENS_WITHDRAWN")?,
        number_buyers: u64_field(value, "NUM_BUYERS")?,
        is_added_liquidity: bool_field(value, "ADDED_LIQUIDITY")?,
        is_force_failed: bool_field(value, "FORCE_FAILED")?,
        is_transferred_fee: bool_field(value, "IS_TRANSFERED_FEE")?,
        is_list_on_amm: bool_field(value, "LIST_ON_UNISWAP")?,
        is_owner_withdrawn: bool_field(value, "IS_OWNER_WITHDRAWN")?,
        is_whitelist_only: bool_field(value, "WHITELIST_ONLY")?,
    })
}

/// Numeric contract fields arrive as strings or numbers depending on the
/// provider; accept both.
fn text_field(value: &Value, key: &str) -> Result<String> {
    match value.get(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        _ => Err(anyhow!("missing field {key} in contract response")),
    }
}

fn u64_field(value: &Value, key: &str) -> Result<u64> {
    text_field(value, key)?
        .parse()
        .with_context(|| format!("field {key} is not an unsigned integer"))
}

fn bool_field(value: &Value, key: &str) -> Result<bool> {
    match value.get(key) {
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(text)) => match text.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(anyhow!("field {key} is not a boolean: {other:?}")),
        },
        _ => Err(anyhow!("missing field {key} in contract response")),
    }
}
