use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::{debug, info, trace};

use super::schema::{
    create_statements, qualified, validate_schema_name, BLOCK_TABLE, TRANSACTION_TABLE,
};
use super::types::{BatchOutcome, Block, BlockRow, Transaction, TransactionRow};
use super::LedgerStore;
use crate::providers::{SqlxCtx, StoreError};

/// PostgreSQL caps a statement at 65535 bind parameters.
const BIND_LIMIT: usize = 65_535;
const BLOCK_COLUMNS: usize = 15;
const TRANSACTION_COLUMNS: usize = 11;

/// Rows a multi-row `INSERT` of `columns` columns can carry.
fn rows_per_statement(columns: usize) -> usize {
    BIND_LIMIT / columns
}

/// PostgreSQL provider for the `block` and `transaction` tables of one schema.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    ctx: SqlxCtx,
    schema: String,
}

impl PgLedgerStore {
    /// Opens the store, creating the database, schema and tables when missing.
    pub async fn connect(db_url: &str, schema: &str) -> Result<Self, StoreError> {
        validate_schema_name(schema)?;
        let ctx = SqlxCtx::create_if_missing(db_url).await?;
        let store = Self {
            ctx,
            schema: schema.to_string(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        info!("Ensuring schema `{}` exists", self.schema);
        for statement in create_statements(&self.schema) {
            sqlx::query(&statement).execute(&self.ctx.pool).await?;
        }
        Ok(())
    }

    fn block_table(&self) -> String {
        qualified(&self.schema, BLOCK_TABLE)
    }

    fn transaction_table(&self) -> String {
        qualified(&self.schema, TRANSACTION_TABLE)
    }

    async fn timestamp_aggregate(
        &self,
        aggregate: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let q = format!("SELECT {aggregate}(timestamp) FROM {}", self.block_table());
        let ts = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(&q)
            .fetch_one(&self.ctx.pool)
            .await?;
        Ok(ts)
    }
}

async fn insert_block_rows(
    conn: &mut PgConnection,
    table: &str,
    blocks: &[Block],
) -> Result<u64, StoreError> {
    if blocks.is_empty() {
        return Ok(0);
    }

    let rows = blocks
        .iter()
        .map(BlockRow::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let inserted_at = Utc::now();
    let mut inserted = 0;

    for batch in rows.chunks(rows_per_statement(BLOCK_COLUMNS)) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {table} (number, hash, parent_hash, nonce, transactions_root, \
             state_root, receipt_root, miner, difficulty, total_difficulty, size, gas_limit, \
             gas_used, timestamp, inserted_at) "
        ));
        builder.push_values(batch, |mut b, row| {
            b.push_bind(row.number)
                .push_bind(row.block.hash.clone())
                .push_bind(row.block.parent_hash.clone())
                .push_bind(row.block.nonce.clone())
                .push_bind(row.block.transactions_root.clone())
                .push_bind(row.block.state_root.clone())
                .push_bind(row.block.receipt_root.clone())
                .push_bind(row.block.miner.clone())
                .push_bind(row.block.difficulty.clone())
                .push_bind(row.block.total_difficulty.clone())
                .push_bind(row.size)
                .push_bind(row.gas_limit)
                .push_bind(row.gas_used)
                .push_bind(row.block.timestamp)
                .push_bind(inserted_at);
        });
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(inserted)
}

async fn insert_transaction_rows(
    conn: &mut PgConnection,
    table: &str,
    transactions: &[Transaction],
) -> Result<u64, StoreError> {
    if transactions.is_empty() {
        return Ok(0);
    }

    let rows = transactions
        .iter()
        .map(TransactionRow::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let inserted_at = Utc::now();
    let mut inserted = 0;

    for batch in rows.chunks(rows_per_statement(TRANSACTION_COLUMNS)) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {table} (hash, block_number, block_hash, nonce, transaction_index, \
             sender, recipient, value, gas, gas_price, inserted_at) "
        ));
        builder.push_values(batch, |mut b, row| {
            b.push_bind(row.transaction.hash.clone())
                .push_bind(row.block_number)
                .push_bind(row.transaction.block_hash.clone())
                .push_bind(row.nonce)
                .push_bind(row.transaction_index)
                .push_bind(row.transaction.sender.clone())
                .push_bind(row.transaction.recipient.clone())
                .push_bind(row.transaction.value.clone())
                .push_bind(row.gas)
                .push_bind(row.gas_price)
                .push_bind(inserted_at);
        });
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(inserted)
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_existing_block_numbers(&self) -> Result<Vec<u64>, StoreError> {
        let q = format!(
            "SELECT DISTINCT number FROM {} ORDER BY number ASC",
            self.block_table()
        );
        let numbers = sqlx::query_scalar::<_, i64>(&q)
            .fetch_all(&self.ctx.pool)
            .await?;

        debug!("Found {} block numbers in the database", numbers.len());

        numbers
            .into_iter()
            .map(|n| {
                u64::try_from(n)
                    .map_err(|_| StoreError::DataValue(format!("negative block number {n}")))
            })
            .collect()
    }

    async fn get_highest_persisted_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.timestamp_aggregate("MAX").await
    }

    async fn get_lowest_persisted_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.timestamp_aggregate("MIN").await
    }

    async fn insert_blocks(&self, blocks: &[Block]) -> Result<u64, StoreError> {
        trace!("Inserting {} blocks to the database.", blocks.len());
        let mut tx = self.ctx.pool.begin().await?;
        let inserted = insert_block_rows(&mut *tx, &self.block_table(), blocks).await?;
        tx.commit().await?;
        trace!("{} blocks inserted.", inserted);
        Ok(inserted)
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<u64, StoreError> {
        trace!("Inserting {} transactions to the database.", transactions.len());
        let mut tx = self.ctx.pool.begin().await?;
        let inserted =
            insert_transaction_rows(&mut *tx, &self.transaction_table(), transactions).await?;
        tx.commit().await?;
        trace!("{} transactions inserted.", inserted);
        Ok(inserted)
    }

    async fn insert_batch(
        &self,
        blocks: &[Block],
        transactions: &[Transaction],
    ) -> Result<BatchOutcome, StoreError> {
        trace!(
            "Inserting batch of {} blocks and {} transactions",
            blocks.len(),
            transactions.len()
        );
        let mut tx = self.ctx.pool.begin().await?;
        let blocks = insert_block_rows(&mut *tx, &self.block_table(), blocks).await?;
        let transactions =
            insert_transaction_rows(&mut *tx, &self.transaction_table(), transactions).await?;
        tx.commit().await?;

        Ok(BatchOutcome {
            blocks,
            transactions,
        })
    }
}
