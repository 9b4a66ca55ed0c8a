mod json_rpc;

pub use json_rpc::JsonRpcChainClient;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::interfaces::error::ChainError;
use crate::interfaces::rpc::RawBlock;

/// Queries against the authoritative chain node.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The node's current frontier.
    async fn fetch_highest_block_number(&self) -> Result<u64, ChainError>;

    /// `None` when the node doesn't have that block yet.
    async fn fetch_block(&self, number: u64) -> Result<Option<RawBlock>, ChainError>;
}
