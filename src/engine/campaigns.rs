//! Campaign creation, lookup and listing with on-chain reconciliation.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn};

use crate::chain::PresaleStateReader;
use crate::engine::lifecycle::{phase, LifecycleClassifier, ResolvedCampaign, SalePhase};
use crate::storage::{CampaignFilter, CampaignInclude, CampaignStore};
use crate::types::{
    AccessType, Address, BuyerRecord, Campaign, CampaignAggregate, CampaignDraft, ErrorCode,
    ServiceResult,
};

/// A campaign joined with its reconciled on-chain view.
///
/// `resolved` is `None` when the snapshot could not be obtained; the campaign
/// row itself is still served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignView {
    pub campaign: Campaign,
    pub resolved: Option<SerializableResolution>,
}

/// Wire form of [`ResolvedCampaign`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableResolution {
    pub status: crate::engine::lifecycle::CampaignStatus,
    pub number_buyers: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<bigdecimal::BigDecimal>,
}

impl From<ResolvedCampaign> for SerializableResolution {
    fn from(resolved: ResolvedCampaign) -> Self {
        Self {
            status: resolved.status,
            number_buyers: resolved.number_buyers,
            price: resolved.price,
        }
    }
}

/// A participated campaign with the wallet's own buyer record attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipatedCampaign {
    #[serde(flatten)]
    pub view: CampaignView,
    pub buyer: Option<BuyerRecord>,
}

pub struct CampaignService {
    store: Arc<dyn CampaignStore>,
    classifier: Arc<LifecycleClassifier>,
    reader: Arc<PresaleStateReader>,
}

impl CampaignService {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        classifier: Arc<LifecycleClassifier>,
        reader: Arc<PresaleStateReader>,
    ) -> Self {
        Self {
            store,
            classifier,
            reader,
        }
    }

    /// Creates a campaign with its sale terms and, for private access, its
    /// whitelist, after checking the sale token is not already tied to a
    /// live, upcoming or successful campaign.
    #[instrument(skip(self, draft, whitelist), fields(contract_address = %draft.contract_address))]
    pub async fn create_campaign(
        &self,
        draft: &CampaignDraft,
        whitelist: &[Address],
    ) -> ServiceResult<i64> {
        match self.create_campaign_inner(draft, whitelist).await {
            Ok(result) => result,
            Err(cause) => {
                error!(?cause, "campaign creation failed");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    async fn create_campaign_inner(
        &self,
        draft: &CampaignDraft,
        whitelist: &[Address],
    ) -> Result<ServiceResult<i64>> {
        if draft.soft_cap > draft.hard_cap {
            return Ok(ServiceResult::err(ErrorCode::InvalidSaleCaps));
        }
        if draft.access_type == AccessType::Private && whitelist.is_empty() {
            return Ok(ServiceResult::err(ErrorCode::InvalidWhitelist));
        }

        if self
            .token_contract_in_use(&draft.token_contract_address, Utc::now())
            .await?
        {
            return Ok(ServiceResult::err(ErrorCode::ContractInUse));
        }

        let whitelist: &[Address] = if draft.access_type == AccessType::Private {
            whitelist
        } else {
            &[]
        };
        let campaign_id = self.store.create_campaign(draft, whitelist).await?;
        Ok(ServiceResult::ok(campaign_id))
    }

    /// A sale token is "in use" while any campaign selling it is upcoming,
    /// live, or closed successfully. A campaign whose chain state cannot be
    /// read blocks reuse rather than allowing a double sale.
    async fn token_contract_in_use(
        &self,
        token_contract_address: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let filter = CampaignFilter {
            token_contract_address: Some(token_contract_address.to_string()),
            ..CampaignFilter::default()
        };
        let existing = self
            .store
            .list_campaigns(&filter, CampaignInclude::frozen())
            .await?;

        for aggregate in &existing {
            if aggregate.campaign.sale_end_time > now {
                return Ok(true);
            }

            if let Some(frozen) = &aggregate.frozen {
                if frozen.is_success {
                    return Ok(true);
                }
                continue;
            }

            match self.classifier.resolve(aggregate, now).await {
                Ok(resolved) => {
                    if let crate::engine::lifecycle::CampaignStatus::Closed { is_success: true } =
                        resolved.status
                    {
                        return Ok(true);
                    }
                }
                Err(cause) => {
                    warn!(
                        campaign_id = aggregate.campaign.campaign_id,
                        ?cause,
                        "could not resolve campaign while checking sale token reuse"
                    );
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Single campaign by id, reconciled with its snapshot.
    pub async fn get_campaign(&self, campaign_id: i64) -> ServiceResult<CampaignView> {
        match self.get_campaign_inner(campaign_id).await {
            Ok(result) => result,
            Err(cause) => {
                error!(campaign_id, ?cause, "campaign lookup failed");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    async fn get_campaign_inner(&self, campaign_id: i64) -> Result<ServiceResult<CampaignView>> {
        let Some(aggregate) = self
            .store
            .campaign_by_id(campaign_id, CampaignInclude::all())
            .await?
        else {
            return Ok(ServiceResult::err(ErrorCode::ProjectNotFound));
        };

        let view = self.reconcile(aggregate, Utc::now()).await;
        Ok(ServiceResult::ok(view))
    }

    /// Campaigns matching `filter`, optionally narrowed to a sale phase,
    /// each reconciled with its snapshot. Snapshot reads fan out
    /// concurrently and are joined back in listing order.
    pub async fn list_campaigns(
        &self,
        filter: &CampaignFilter,
        phase_filter: Option<SalePhase>,
    ) -> ServiceResult<Vec<CampaignView>> {
        match self.list_campaigns_inner(filter, phase_filter).await {
            Ok(views) => ServiceResult::ok(views),
            Err(cause) => {
                error!(?cause, "campaign listing failed");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    async fn list_campaigns_inner(
        &self,
        filter: &CampaignFilter,
        phase_filter: Option<SalePhase>,
    ) -> Result<Vec<CampaignView>> {
        let now = Utc::now();
        let mut aggregates = self
            .store
            .list_campaigns(filter, CampaignInclude::frozen())
            .await?;

        if let Some(wanted) = phase_filter {
            aggregates.retain(|aggregate| {
                phase(
                    now,
                    aggregate.campaign.sale_start_time,
                    aggregate.campaign.sale_end_time,
                ) == wanted
            });
        }

        let views = join_all(
            aggregates
                .into_iter()
                .map(|aggregate| self.reconcile(aggregate, now)),
        )
        .await;

        Ok(views)
    }

    /// Records that a wallet deposited into a campaign. Idempotent.
    pub async fn record_participation(
        &self,
        wallet_address: &str,
        campaign_id: i64,
    ) -> ServiceResult<()> {
        match self
            .store
            .record_participation(wallet_address, campaign_id)
            .await
        {
            Ok(()) => ServiceResult::ok(()),
            Err(cause) => {
                error!(wallet_address, campaign_id, ?cause, "failed to record participation");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    /// Campaigns the wallet has participated in on a network, with the
    /// wallet's buyer record attached to each.
    pub async fn participated_campaigns(
        &self,
        wallet_address: &str,
        network_id: u64,
    ) -> ServiceResult<Vec<ParticipatedCampaign>> {
        match self
            .participated_campaigns_inner(wallet_address, network_id)
            .await
        {
            Ok(campaigns) => ServiceResult::ok(campaigns),
            Err(cause) => {
                error!(wallet_address, network_id, ?cause, "participated campaign listing failed");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    async fn participated_campaigns_inner(
        &self,
        wallet_address: &str,
        network_id: u64,
    ) -> Result<Vec<ParticipatedCampaign>> {
        let campaign_ids = self
            .store
            .participated_campaign_ids(wallet_address, network_id)
            .await?;
        if campaign_ids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = CampaignFilter {
            campaign_ids: Some(campaign_ids),
            ..CampaignFilter::default()
        };
        let aggregates = self
            .store
            .list_campaigns(&filter, CampaignInclude::frozen())
            .await?;

        let now = Utc::now();
        let buyers = join_all(aggregates.iter().map(|aggregate| {
            self.reader.read_buyer(
                &aggregate.campaign.contract_address,
                aggregate.campaign.network_id,
                wallet_address,
            )
        }))
        .await;

        let views = join_all(
            aggregates
                .into_iter()
                .map(|aggregate| self.reconcile(aggregate, now)),
        )
        .await;

        Ok(views
            .into_iter()
            .zip(buyers)
            .map(|(view, buyer)| ParticipatedCampaign {
                view,
                buyer: buyer.into_result().ok(),
            })
            .collect())
    }

    /// Attaches the reconciled on-chain view to a campaign; a failed
    /// resolution leaves the view empty instead of failing the caller.
    async fn reconcile(&self, aggregate: CampaignAggregate, now: DateTime<Utc>) -> CampaignView {
        let resolved = match self.classifier.resolve(&aggregate, now).await {
            Ok(resolved) => Some(resolved.into()),
            Err(cause) => {
                warn!(
                    campaign_id = aggregate.campaign.campaign_id,
                    ?cause,
                    "could not resolve campaign snapshot"
                );
                None
            }
        };

        CampaignView {
            campaign: aggregate.campaign,
            resolved,
        }
    }
}
