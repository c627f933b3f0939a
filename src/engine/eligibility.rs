//! Deposit eligibility checks against campaign terms and live contract state.
//!
//! Checks short-circuit in a fixed order so identical inputs always produce
//! the same rejection reason: sold-out, per-wallet cap, whitelist, then
//! stablecoin balance.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, instrument};

use crate::chain::PresaleStateReader;
use crate::config::ChainRegistry;
use crate::engine::currency::{parse_decimal, to_human_units};
use crate::storage::{CampaignInclude, CampaignStore};
use crate::types::{
    AccessType, Address, CampaignAggregate, Currency, DepositVerdict, ErrorCode, OnChainSnapshot,
    ServiceResult,
};

/// A prospective deposit to validate.
#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub depositor: Address,
    /// Requested amount in payment-token base units; used for stablecoin sales.
    pub token_amount: String,
    /// Requested amount of native coin in human units; used for native sales.
    pub native_amount: String,
}

pub struct EligibilityEngine {
    reader: Arc<PresaleStateReader>,
    store: Arc<dyn CampaignStore>,
    registry: ChainRegistry,
}

impl EligibilityEngine {
    pub fn new(
        reader: Arc<PresaleStateReader>,
        store: Arc<dyn CampaignStore>,
        registry: ChainRegistry,
    ) -> Self {
        Self {
            reader,
            store,
            registry,
        }
    }

    /// Boundary entry point: loads the campaign for a presale contract, reads
    /// its live snapshot and runs the deposit checks.
    pub async fn authorize_deposit(
        &self,
        contract_address: &str,
        network_id: u64,
        request: &DepositRequest,
    ) -> ServiceResult<DepositVerdict> {
        match self
            .authorize_deposit_inner(contract_address, network_id, request)
            .await
        {
            Ok(result) => result,
            Err(cause) => {
                error!(contract_address, network_id, ?cause, "deposit authorization failed");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    async fn authorize_deposit_inner(
        &self,
        contract_address: &str,
        network_id: u64,
        request: &DepositRequest,
    ) -> Result<ServiceResult<DepositVerdict>> {
        let Some(aggregate) = self
            .store
            .campaign_by_contract(contract_address, network_id, CampaignInclude::whitelist())
            .await?
        else {
            return Ok(ServiceResult::err(ErrorCode::ProjectNotFound));
        };

        let snapshot = self
            .reader
            .fetch_status(contract_address, network_id)
            .await?;

        let verdict = self.check_deposit(&aggregate, &snapshot, request).await?;
        Ok(ServiceResult::ok(verdict))
    }

    /// Runs the ordered deposit checks. Rejections are returned as values;
    /// only transport and parse failures are errors.
    #[instrument(
        skip(self, aggregate, snapshot, request),
        fields(campaign_id = aggregate.campaign.campaign_id, depositor = %request.depositor)
    )]
    pub async fn check_deposit(
        &self,
        aggregate: &CampaignAggregate,
        snapshot: &OnChainSnapshot,
        request: &DepositRequest,
    ) -> Result<DepositVerdict> {
        let campaign = &aggregate.campaign;

        // 1. Sold out: everything collected so far against the hard cap.
        let total_collected =
            to_human_units(campaign.payment_currency, &snapshot.total_base_collected)?;
        if total_collected >= campaign.hard_cap {
            debug!("rejected: hard cap reached");
            return Ok(DepositVerdict::Reject(ErrorCode::AllTokenSoldOut));
        }

        // 2. Per-wallet cap, only when the campaign configures one.
        if let Some(max_allocation) = &campaign.max_allocation_wallet {
            let buyer = self
                .reader
                .fetch_buyer(
                    &campaign.contract_address,
                    campaign.network_id,
                    &request.depositor,
                )
                .await
                .context("buyer record read failed")?;
            let deposited = to_human_units(campaign.payment_currency, &buyer.base_deposited)?;

            let buying = match campaign.payment_currency {
                Currency::Eth | Currency::Bnb => parse_decimal(&request.native_amount)?,
                Currency::Usdt | Currency::Busd => {
                    to_human_units(campaign.payment_currency, &request.token_amount)?
                }
            };

            if &buying + &deposited > *max_allocation {
                debug!(%deposited, %buying, "rejected: per-wallet allocation exceeded");
                return Ok(DepositVerdict::Reject(ErrorCode::AllocationExceeded));
            }
        }

        // 3. Private campaigns only admit whitelisted wallets.
        if campaign.access_type == AccessType::Private {
            if let Some(whitelist) = &aggregate.whitelist {
                if !whitelist.is_empty() && !is_whitelisted(whitelist, &request.depositor) {
                    debug!("rejected: wallet not in whitelist");
                    return Ok(DepositVerdict::Reject(ErrorCode::NotWhitelisted));
                }
            }
        }

        // 4. Stablecoin deposits need sufficient token balance in the wallet.
        if campaign.payment_currency.is_stablecoin() {
            let token_contract = self
                .registry
                .token_contract(campaign.network_id, campaign.payment_currency)?;
            let balance = self
                .reader
                .fetch_erc20_balance(token_contract, campaign.network_id, &request.depositor)
                .await
                .context("token balance read failed")?;

            let requested = parse_decimal(&request.token_amount)?;
            let balance = parse_decimal(&balance)?;
            if requested > balance {
                debug!(%requested, %balance, "rejected: insufficient token balance");
                return Ok(DepositVerdict::Reject(ErrorCode::InsufficientBalance));
            }
        }

        Ok(DepositVerdict::Allow)
    }
}

fn is_whitelisted(whitelist: &[crate::types::WhitelistEntry], depositor: &str) -> bool {
    let depositor = depositor.to_lowercase();
    whitelist
        .iter()
        .any(|entry| entry.wallet_address.to_lowercase() == depositor)
}
