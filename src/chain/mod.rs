//! Read-only adapters over the on-chain presale contract.
//!
//! The transport is abstracted behind [`ChainQuery`]; the engine only ever
//! issues read calls and never estimates gas or mutates chain state.

pub mod reader;
pub mod rpc;

pub use reader::PresaleStateReader;
pub use rpc::JsonRpcChainQuery;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Opaque "call a read-only contract method" transport.
///
/// Implementations resolve the provider for `network_id` themselves; an
/// unknown network id is a configuration error.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    async fn call_read_method(
        &self,
        network_id: u64,
        contract_address: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Value>;
}
