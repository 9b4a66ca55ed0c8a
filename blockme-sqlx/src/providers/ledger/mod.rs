//! Block and transaction tables of the mirror.
mod pg_provider;
pub mod schema;
pub mod types;

pub use pg_provider::PgLedgerStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::providers::StoreError;
use types::{BatchOutcome, Block, Transaction};

/// Requests the ingestion pipeline makes to the mirror.
///
/// Every insert is all-or-nothing: on error nothing from the call is
/// persisted. Existing rows are never updated.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Distinct persisted block numbers, ascending.
    async fn get_existing_block_numbers(&self) -> Result<Vec<u64>, StoreError>;

    async fn get_highest_persisted_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn get_lowest_persisted_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn insert_blocks(&self, blocks: &[Block]) -> Result<u64, StoreError>;

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<u64, StoreError>;

    /// Inserts a chunk: its blocks first, then its transactions, as one unit.
    async fn insert_batch(
        &self,
        blocks: &[Block],
        transactions: &[Transaction],
    ) -> Result<BatchOutcome, StoreError>;
}
