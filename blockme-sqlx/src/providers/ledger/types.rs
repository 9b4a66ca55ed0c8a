use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::providers::StoreError;

/// Integer digits kept for a transaction value, `NUMERIC(30, 10)`.
pub const VALUE_INTEGER_DIGITS: u64 = 20;
/// Fractional digits kept for a transaction value.
pub const VALUE_SCALE: i64 = 10;

/// One row per chain block.
///
/// Hash-like fields (and `difficulty`/`total_difficulty`) are kept as the
/// textual form returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub nonce: String,
    pub transactions_root: String,
    pub state_root: String,
    pub receipt_root: String,
    pub miner: String,
    pub difficulty: String,
    pub total_difficulty: String,
    pub size: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: DateTime<Utc>,
}

/// One row per transaction. The owning block is referenced by key only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    pub block_number: u64,
    pub block_hash: String,
    pub nonce: u64,
    pub transaction_index: u64,
    pub sender: String,
    /// Absent for contract creation.
    pub recipient: Option<String>,
    /// Base-unit amount scaled down by 10^18, truncated to [`VALUE_SCALE`].
    pub value: BigDecimal,
    pub gas: u64,
    pub gas_price: u64,
}

/// Rows written by a single `insert_batch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub blocks: u64,
    pub transactions: u64,
}

/// Block as bound to `BIGINT` columns.
#[derive(Debug, Clone)]
pub(crate) struct BlockRow<'a> {
    pub number: i64,
    pub size: i64,
    pub gas_limit: i64,
    pub gas_used: i64,
    pub block: &'a Block,
}

impl<'a> TryFrom<&'a Block> for BlockRow<'a> {
    type Error = StoreError;

    fn try_from(block: &'a Block) -> Result<Self, Self::Error> {
        Ok(Self {
            number: to_bigint("block.number", block.number)?,
            size: to_bigint("block.size", block.size)?,
            gas_limit: to_bigint("block.gas_limit", block.gas_limit)?,
            gas_used: to_bigint("block.gas_used", block.gas_used)?,
            block,
        })
    }
}

/// Transaction as bound to `BIGINT` columns.
#[derive(Debug, Clone)]
pub(crate) struct TransactionRow<'a> {
    pub block_number: i64,
    pub nonce: i64,
    pub transaction_index: i64,
    pub gas: i64,
    pub gas_price: i64,
    pub transaction: &'a Transaction,
}

impl<'a> TryFrom<&'a Transaction> for TransactionRow<'a> {
    type Error = StoreError;

    fn try_from(tx: &'a Transaction) -> Result<Self, Self::Error> {
        Ok(Self {
            block_number: to_bigint("transaction.block_number", tx.block_number)?,
            nonce: to_bigint("transaction.nonce", tx.nonce)?,
            transaction_index: to_bigint("transaction.transaction_index", tx.transaction_index)?,
            gas: to_bigint("transaction.gas", tx.gas)?,
            gas_price: to_bigint("transaction.gas_price", tx.gas_price)?,
            transaction: tx,
        })
    }
}

fn to_bigint(column: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::DataValue(format!("{column} = {value} exceeds BIGINT range")))
}
