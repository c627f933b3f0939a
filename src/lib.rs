//! presale-engine - reconciliation core for a token-sale platform
//!
//! Merges authoritative on-chain presale contract state with locally
//! persisted campaign configuration to decide whether deposits are allowed,
//! whether campaigns have closed and succeeded, and platform-wide statistics.

pub mod chain;
pub mod config;
pub mod engine;
pub mod pricing;
pub mod storage;
pub mod types;

// Re-export main types for convenience
pub use types::{
    Campaign, CampaignAggregate, Currency, DepositVerdict, ErrorCode, OnChainSnapshot,
    ServiceResult,
};
