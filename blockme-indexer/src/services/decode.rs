use bigdecimal::BigDecimal;
use blockme_sqlx::providers::ledger::types::{VALUE_INTEGER_DIGITS, VALUE_SCALE};
use blockme_sqlx::{Block, Transaction};
use chrono::{DateTime, Utc};
use num_bigint::{BigInt, BigUint};

use crate::helpers::hex::{parse_hex_bigint, parse_hex_quantity, parse_hex_u64};
use crate::interfaces::error::DecodeError;
use crate::interfaces::rpc::{RawBlock, RawTransaction};

/// Decimal places between the base unit and the stored value.
const BASE_UNIT_DECIMALS: i64 = 18;

/// Turns a fetched block into its row and its transaction rows, in the order
/// the node listed them.
///
/// Integer fields must fit a `BIGINT` column, so a block that the store
/// would refuse fails here instead.
pub fn decode_block(raw: &RawBlock) -> Result<(Block, Vec<Transaction>), DecodeError> {
    let number = parse_hex_bigint("number", required("number", &raw.number)?)?;

    let block = Block {
        number,
        hash: required("hash", &raw.hash)?.to_string(),
        parent_hash: required("parentHash", &raw.parent_hash)?.to_string(),
        nonce: required("nonce", &raw.nonce)?.to_string(),
        transactions_root: required("transactionsRoot", &raw.transactions_root)?.to_string(),
        state_root: required("stateRoot", &raw.state_root)?.to_string(),
        receipt_root: required("receiptsRoot", &raw.receipts_root)?.to_string(),
        miner: required("miner", &raw.miner)?.to_string(),
        difficulty: required("difficulty", &raw.difficulty)?.to_string(),
        total_difficulty: required("totalDifficulty", &raw.total_difficulty)?.to_string(),
        size: parse_hex_bigint("size", required("size", &raw.size)?)?,
        gas_limit: parse_hex_bigint("gasLimit", required("gasLimit", &raw.gas_limit)?)?,
        gas_used: parse_hex_bigint("gasUsed", required("gasUsed", &raw.gas_used)?)?,
        timestamp: decode_timestamp(required("timestamp", &raw.timestamp)?)?,
    };

    let transactions = raw
        .transactions
        .as_ref()
        .ok_or(DecodeError::MissingField("transactions"))?
        .iter()
        .map(|tx| decode_transaction(&block, tx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((block, transactions))
}

fn decode_transaction(block: &Block, raw: &RawTransaction) -> Result<Transaction, DecodeError> {
    let listed_in = parse_hex_u64("blockNumber", required("blockNumber", &raw.block_number)?)?;
    if listed_in != block.number {
        return Err(DecodeError::Mismatch {
            field: "blockNumber",
            expected: block.number.to_string(),
            found: listed_in.to_string(),
        });
    }
    let block_hash = required("blockHash", &raw.block_hash)?;
    if block_hash != block.hash {
        return Err(DecodeError::Mismatch {
            field: "blockHash",
            expected: block.hash.clone(),
            found: block_hash.to_string(),
        });
    }

    Ok(Transaction {
        hash: required("hash", &raw.hash)?.to_string(),
        block_number: block.number,
        block_hash: block_hash.to_string(),
        nonce: parse_hex_bigint("nonce", required("nonce", &raw.nonce)?)?,
        transaction_index: parse_hex_bigint(
            "transactionIndex",
            required("transactionIndex", &raw.transaction_index)?,
        )?,
        sender: required("from", &raw.from)?.to_string(),
        recipient: raw.to.clone(),
        value: decode_value(required("value", &raw.value)?)?,
        gas: parse_hex_bigint("gas", required("gas", &raw.gas)?)?,
        gas_price: parse_hex_bigint("gasPrice", required("gasPrice", &raw.gas_price)?)?,
    })
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, DecodeError> {
    value.as_deref().ok_or(DecodeError::MissingField(field))
}

/// Hex epoch seconds to a UTC instant.
pub fn decode_timestamp(text: &str) -> Result<DateTime<Utc>, DecodeError> {
    let seconds = parse_hex_u64("timestamp", text)?;
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .ok_or_else(|| DecodeError::InvalidTimestamp(text.to_string()))
}

/// Hex base-unit amount divided by 10^18.
///
/// The result is truncated toward zero to [`VALUE_SCALE`] fractional digits,
/// never rounded. Amounts that need more than [`VALUE_INTEGER_DIGITS`]
/// integer digits are rejected.
pub fn decode_value(text: &str) -> Result<BigDecimal, DecodeError> {
    let wei = parse_hex_quantity("value", text)?;

    let limit = BigUint::from(10u32).pow((VALUE_INTEGER_DIGITS + BASE_UNIT_DECIMALS as u64) as u32);
    if wei >= limit {
        return Err(DecodeError::OutOfRange {
            field: "value",
            value: text.to_string(),
        });
    }

    Ok(BigDecimal::new(BigInt::from(wei), BASE_UNIT_DECIMALS).with_scale(VALUE_SCALE))
}
