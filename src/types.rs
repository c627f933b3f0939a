//! Core domain types for the presale reconciliation engine.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wallet or contract address on an EVM-style chain.
/// Address comparison in this crate is always case-insensitive.
pub type Address = String;

/// Payment currencies a presale contract can be denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Native coin, 18 decimals
    Eth,
    /// Native coin, 18 decimals
    Bnb,
    /// Stablecoin, 6 decimals
    Usdt,
    /// Stablecoin, 18 decimals
    Busd,
}

impl Currency {
    /// Decimal exponent of the currency's base unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::Eth => 18,
            Currency::Bnb => 18,
            Currency::Usdt => 6,
            Currency::Busd => 18,
        }
    }

    /// Whether deposits are made in an ERC20-style token rather than the native coin.
    pub fn is_stablecoin(&self) -> bool {
        matches!(self, Currency::Usdt | Currency::Busd)
    }

    /// Returns the currency code used in storage and price lookups.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Eth => "ETH",
            Currency::Bnb => "BNB",
            Currency::Usdt => "USDT",
            Currency::Busd => "BUSD",
        }
    }

    /// Returns all supported currencies.
    pub fn all() -> Vec<Currency> {
        vec![Currency::Eth, Currency::Bnb, Currency::Usdt, Currency::Busd]
    }
}

impl std::str::FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "ETH" => Ok(Currency::Eth),
            "BNB" => Ok(Currency::Bnb),
            "USDT" => Ok(Currency::Usdt),
            "BUSD" => Ok(Currency::Busd),
            other => Err(anyhow::anyhow!("unknown payment currency {other:?}")),
        }
    }
}

/// Who may deposit into a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessType {
    Public,
    Private,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Public => "public",
            AccessType::Private => "private",
        }
    }
}

impl std::str::FromStr for AccessType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "public" => Ok(AccessType::Public),
            "private" => Ok(AccessType::Private),
            other => Err(anyhow::anyhow!("unknown access type {other:?}")),
        }
    }
}

/// Optional AMM listing metadata attached to a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingInfo {
    pub amm: String,
    pub currency_pair: String,
}

/// A fundraising campaign and its sale terms, as persisted.
///
/// Caps and allocation limits are human-unit decimals; base-unit integers only
/// ever appear in on-chain reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: i64,
    /// Owning wallet
    pub wallet_address: Address,
    pub network_id: u64,
    /// Deployed presale contract
    pub contract_address: Address,
    /// The token being sold
    pub token_contract_address: Address,
    pub payment_currency: Currency,
    pub hard_cap: BigDecimal,
    pub soft_cap: BigDecimal,
    pub max_allocation_wallet: Option<BigDecimal>,
    pub min_allocation_wallet: Option<BigDecimal>,
    pub access_type: AccessType,
    pub sale_start_time: DateTime<Utc>,
    pub sale_end_time: DateTime<Utc>,
    pub listing: Option<ListingInfo>,
}

/// Campaign attributes supplied at creation time, before an id is assigned.
#[derive(Debug, Clone)]
pub struct CampaignDraft {
    pub wallet_address: Address,
    pub network_id: u64,
    pub contract_address: Address,
    pub token_contract_address: Address,
    pub payment_currency: Currency,
    pub hard_cap: BigDecimal,
    pub soft_cap: BigDecimal,
    pub max_allocation_wallet: Option<BigDecimal>,
    pub min_allocation_wallet: Option<BigDecimal>,
    pub access_type: AccessType,
    pub sale_start_time: DateTime<Utc>,
    pub sale_end_time: DateTime<Utc>,
    pub listing: Option<ListingInfo>,
}

/// One whitelisted wallet for a private campaign. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub campaign_id: i64,
    pub wallet_address: Address,
}

/// A campaign together with the related rows the caller asked for.
///
/// `whitelist` and `frozen` are `None` when the corresponding include flag was
/// not set on the query, not when the rows are merely absent.
#[derive(Debug, Clone)]
pub struct CampaignAggregate {
    pub campaign: Campaign,
    pub whitelist: Option<Vec<WhitelistEntry>>,
    pub frozen: Option<FrozenPresale>,
}

/// Live state of a presale contract as returned by its `STATUS()` view.
///
/// Amounts are decimal strings of base-unit integers, exactly as the contract
/// reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnChainSnapshot {
    pub total_base_collected: String,
    pub total_tokens_sold: String,
    pub total_base_withdrawn: String,
    pub total_tokens_withdrawn: String,
    pub number_buyers: u64,
    pub is_added_liquidity: bool,
    pub is_force_failed: bool,
    pub is_transferred_fee: bool,
    pub is_list_on_amm: bool,
    pub is_owner_withdrawn: bool,
    pub is_whitelist_only: bool,
}

/// Per-wallet cumulative deposit as returned by the contract's `BUYERS` view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyerRecord {
    /// Base-currency deposited so far, base units
    pub base_deposited: String,
    /// Sale tokens owed to the buyer, base units
    pub tokens_owed: String,
}

/// Final snapshot of a closed campaign, persisted exactly once.
///
/// Payment-currency amounts are converted to human units at freeze time;
/// sale-token amounts stay in base units because the engine never learns the
/// sale token's decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrozenPresale {
    pub campaign_id: i64,
    pub total_base_collected: BigDecimal,
    pub total_base_withdrawn: BigDecimal,
    pub total_tokens_sold: String,
    pub total_tokens_withdrawn: String,
    pub number_buyers: u64,
    pub is_added_liquidity: bool,
    pub is_force_failed: bool,
    pub is_transferred_fee: bool,
    pub is_list_on_amm: bool,
    pub is_owner_withdrawn: bool,
    pub is_whitelist_only: bool,
    pub is_success: bool,
    /// USD value of `total_base_collected`, looked up at freeze time
    pub price: BigDecimal,
}

/// Error taxonomy surfaced across the service boundary.
///
/// The first four are expected business rejections; the rest are lookup,
/// configuration and transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[error("wallet is not in the campaign whitelist")]
    NotWhitelisted,
    #[error("total bought and buying exceeds the per-wallet limit")]
    AllocationExceeded,
    #[error("all tokens have been sold out")]
    AllTokenSoldOut,
    #[error("not enough payment token balance in wallet")]
    InsufficientBalance,
    #[error("campaign not found")]
    ProjectNotFound,
    #[error("soft cap must not exceed hard cap")]
    InvalidSaleCaps,
    #[error("private campaign requires a non-empty whitelist")]
    InvalidWhitelist,
    #[error("sale token is tied to a live, upcoming or successful campaign")]
    ContractInUse,
    #[error("system error")]
    SystemError,
}

/// Body of the `error` field in a [`ServiceResult`] envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
}

/// Uniform result envelope produced by the engine for request handlers:
/// `{ success, result?, error: { code }? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ServiceResult<T> {
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(code: ErrorCode) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ErrorBody { code }),
        }
    }

    /// Unwraps the envelope back into a plain result.
    pub fn into_result(self) -> Result<T, ErrorCode> {
        match (self.success, self.result, self.error) {
            (true, Some(result), _) => Ok(result),
            (_, _, Some(body)) => Err(body.code),
            _ => Err(ErrorCode::SystemError),
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.map(|body| body.code)
    }
}

/// Outcome of a deposit eligibility check. Rejections are expected business
/// results, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositVerdict {
    Allow,
    Reject(ErrorCode),
}

impl DepositVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, DepositVerdict::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_to_wire_names() {
        let json = serde_json::to_string(&ErrorCode::AllTokenSoldOut).unwrap();
        assert_eq!(json, "\"ALL_TOKEN_SOLD_OUT\"");
        let json = serde_json::to_string(&ErrorCode::NotWhitelisted).unwrap();
        assert_eq!(json, "\"NOT_WHITELISTED\"");
        let json = serde_json::to_string(&ErrorCode::SystemError).unwrap();
        assert_eq!(json, "\"SYSTEM_ERROR\"");
    }

    #[test]
    fn envelope_shape_matches_boundary_contract() {
        let ok: ServiceResult<u32> = ServiceResult::ok(7);
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value, serde_json::json!({ "success": true, "result": 7 }));

        let err: ServiceResult<u32> = ServiceResult::err(ErrorCode::SystemError);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "success": false, "error": { "code": "SYSTEM_ERROR" } })
        );
    }

    #[test]
    fn currency_codes_round_trip() {
        for currency in Currency::all() {
            let parsed: Currency = currency.as_str().parse().unwrap();
            assert_eq!(parsed, currency);
        }
        assert!("DOGE".parse::<Currency>().is_err());
    }
}
