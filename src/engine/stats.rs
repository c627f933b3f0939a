//! Aggregate statistics over a set of campaigns.
//!
//! Snapshot and price reads fan out concurrently; results are joined back in
//! input order. A campaign whose snapshot cannot be resolved contributes
//! nothing to the counters but never fails the batch.

use std::sync::Arc;

use anyhow::Result;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::engine::lifecycle::{CampaignStatus, LifecycleClassifier};
use crate::storage::{CampaignFilter, CampaignInclude, CampaignStore};
use crate::types::{CampaignAggregate, ErrorCode, ServiceResult};

/// Per-status campaign counts. Successful campaigns are a subset of closed
/// ones and are counted in both buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTotals {
    pub closed: u64,
    pub success: u64,
    pub live_and_upcoming: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStatistics {
    pub participants: u64,
    pub totals: CampaignTotals,
    pub total_funding_usd: BigDecimal,
}

pub struct StatisticsAggregator {
    store: Arc<dyn CampaignStore>,
    classifier: Arc<LifecycleClassifier>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn CampaignStore>, classifier: Arc<LifecycleClassifier>) -> Self {
        Self { store, classifier }
    }

    /// Boundary entry point: statistics over all campaigns matching `filter`.
    pub async fn statistics(&self, filter: &CampaignFilter) -> ServiceResult<CampaignStatistics> {
        match self.statistics_inner(filter).await {
            Ok(statistics) => ServiceResult::ok(statistics),
            Err(cause) => {
                error!(?cause, "statistics aggregation failed");
                ServiceResult::err(ErrorCode::SystemError)
            }
        }
    }

    async fn statistics_inner(&self, filter: &CampaignFilter) -> Result<CampaignStatistics> {
        let campaigns = self
            .store
            .list_campaigns(filter, CampaignInclude::frozen())
            .await?;

        Ok(self.aggregate(&campaigns, Utc::now()).await)
    }

    /// Folds classification and pricing over the given campaigns.
    pub async fn aggregate(
        &self,
        campaigns: &[CampaignAggregate],
        now: DateTime<Utc>,
    ) -> CampaignStatistics {
        let resolutions = join_all(
            campaigns
                .iter()
                .map(|aggregate| self.classifier.resolve(aggregate, now)),
        )
        .await;

        let mut statistics = CampaignStatistics {
            participants: 0,
            totals: CampaignTotals::default(),
            total_funding_usd: BigDecimal::zero(),
        };

        for (aggregate, resolution) in campaigns.iter().zip(resolutions) {
            let resolved = match resolution {
                Ok(resolved) => resolved,
                Err(cause) => {
                    warn!(
                        campaign_id = aggregate.campaign.campaign_id,
                        ?cause,
                        "skipping campaign in statistics"
                    );
                    continue;
                }
            };

            statistics.participants += resolved.number_buyers;
            match resolved.status {
                CampaignStatus::Closed { is_success } => {
                    statistics.totals.closed += 1;
                    if is_success {
                        statistics.totals.success += 1;
                        if let Some(price) = resolved.price {
                            statistics.total_funding_usd += price;
                        }
                    }
                }
                CampaignStatus::Upcoming | CampaignStatus::Live => {
                    statistics.totals.live_and_upcoming += 1;
                }
            }
        }

        statistics
    }
}
