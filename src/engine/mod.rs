//! Reconciliation engine: currency conversion, deposit eligibility,
//! lifecycle classification and statistics aggregation.

pub mod campaigns;
pub mod currency;
pub mod eligibility;
pub mod lifecycle;
pub mod stats;

// Re-export main components
pub use campaigns::{CampaignService, CampaignView, ParticipatedCampaign};
pub use currency::{to_base_units, to_human_units};
pub use eligibility::{DepositRequest, EligibilityEngine};
pub use lifecycle::{phase, CampaignStatus, LifecycleClassifier, ResolvedCampaign, SalePhase};
pub use stats::{CampaignStatistics, CampaignTotals, StatisticsAggregator};
