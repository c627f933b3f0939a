//! Campaign lifecycle classification and snapshot freezing.
//!
//! A campaign is upcoming, live or closed purely as a function of the clock
//! and its configured sale window. The first time a closed campaign is
//! observed without a frozen record, its final snapshot is priced and
//! persisted; every later read prefers the frozen record.

use std::sync::Arc;

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::chain::PresaleStateReader;
use crate::engine::currency::to_human_units;
use crate::pricing::PriceLookup;
use crate::storage::CampaignStore;
use crate::types::{Campaign, CampaignAggregate, FrozenPresale, OnChainSnapshot};

/// Position of the clock inside a campaign's sale window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalePhase {
    Upcoming,
    Live,
    Closed,
}

/// Pure classification of a sale window. Monotonic in `now`: once closed, a
/// later `now` can never reopen the campaign.
pub fn phase(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> SalePhase {
    if now < start {
        SalePhase::Upcoming
    } else if now < end {
        SalePhase::Live
    } else {
        SalePhase::Closed
    }
}

/// Full campaign status, resolving closed campaigns into success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Upcoming,
    Live,
    Closed { is_success: bool },
}

impl CampaignStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, CampaignStatus::Closed { .. })
    }
}

/// Reconciled view of one campaign.
#[derive(Debug, Clone)]
pub struct ResolvedCampaign {
    pub campaign_id: i64,
    pub status: CampaignStatus,
    pub number_buyers: u64,
    /// USD value of collected funds; present once the campaign is closed.
    pub price: Option<BigDecimal>,
}

pub struct LifecycleClassifier {
    reader: Arc<PresaleStateReader>,
    store: Arc<dyn CampaignStore>,
    price: Arc<dyn PriceLookup>,
}

impl LifecycleClassifier {
    pub fn new(
        reader: Arc<PresaleStateReader>,
        store: Arc<dyn CampaignStore>,
        price: Arc<dyn PriceLookup>,
    ) -> Self {
        Self {
            reader,
            store,
            price,
        }
    }

    /// Reconciles one campaign against its authoritative source: the frozen
    /// record when it exists, the live contract otherwise.
    ///
    /// The aggregate must have been loaded with the frozen include flag set,
    /// otherwise a closed campaign would be re-priced on every read.
    #[instrument(skip(self, aggregate), fields(campaign_id = aggregate.campaign.campaign_id))]
    pub async fn resolve(
        &self,
        aggregate: &CampaignAggregate,
        now: DateTime<Utc>,
    ) -> Result<ResolvedCampaign> {
        let campaign = &aggregate.campaign;

        if let Some(frozen) = &aggregate.frozen {
            return Ok(ResolvedCampaign {
                campaign_id: campaign.campaign_id,
                status: CampaignStatus::Closed {
                    is_success: frozen.is_success,
                },
                number_buyers: frozen.number_buyers,
                price: Some(frozen.price.clone()),
            });
        }

        let snapshot = self
            .reader
            .fetch_status(&campaign.contract_address, campaign.network_id)
            .await?;

        match phase(now, campaign.sale_start_time, campaign.sale_end_time) {
            SalePhase::Upcoming => Ok(ResolvedCampaign {
                campaign_id: campaign.campaign_id,
                status: CampaignStatus::Upcoming,
                number_buyers: snapshot.number_buyers,
                price: None,
            }),
            SalePhase::Live => Ok(ResolvedCampaign {
                campaign_id: campaign.campaign_id,
                status: CampaignStatus::Live,
                number_buyers: snapshot.number_buyers,
                price: None,
            }),
            SalePhase::Closed => self.close_out(campaign, &snapshot).await,
        }
    }

    /// First observation of a closed campaign: price the final total and
    /// persist the frozen record at most once.
    async fn close_out(
        &self,
        campaign: &Campaign,
        snapshot: &OnChainSnapshot,
    ) -> Result<ResolvedCampaign> {
        let total_collected =
            to_human_units(campaign.payment_currency, &snapshot.total_base_collected)?;
        let is_success = total_collected >= campaign.soft_cap;

        let price = self
            .price
            .price_of(campaign.payment_currency, &total_collected)
            .await
            .context("price lookup for closed campaign failed")?;

        let record = FrozenPresale {
            campaign_id: campaign.campaign_id,
            total_base_collected: total_collected,
            total_base_withdrawn: to_human_units(
                campaign.payment_currency,
                &snapshot.total_base_withdrawn,
            )?,
            total_tokens_sold: snapshot.total_tokens_sold.clone(),
            total_tokens_withdrawn: snapshot.total_tokens_withdrawn.clone(),
            number_buyers: snapshot.number_buyers,
            is_added_liquidity: snapshot.is_added_liquidity,
            is_force_failed: snapshot.is_force_failed,
            is_transferred_fee: snapshot.is_transferred_fee,
            is_list_on_amm: snapshot.is_list_on_amm,
            is_owner_withdrawn: snapshot.is_owner_withdrawn,
            is_whitelist_only: snapshot.is_whitelist_only,
            is_success,
            price: price.clone(),
        };

        let created = self.store.insert_frozen_presale(&record).await?;
        if !created {
            // First writer wins; this price is discarded.
            debug!(campaign_id = campaign.campaign_id, "presale already frozen by another writer");
        }

        Ok(ResolvedCampaign {
            campaign_id: campaign.campaign_id,
            status: CampaignStatus::Closed { is_success },
            number_buyers: snapshot.number_buyers,
            price: Some(price),
        })
    }
}
