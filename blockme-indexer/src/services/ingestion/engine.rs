use std::ops::RangeInclusive;
use std::sync::Arc;

use blockme_sqlx::{BatchOutcome, Block, LedgerStore, Transaction};
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error_log::InsertionErrorLog;
use super::report::RunReport;
use crate::helpers::app_config::AppConfig;
use crate::interfaces::error::{DecodeError, IngestError};
use crate::services::chain::ChainClient;
use crate::services::decode::decode_block;
use crate::services::gaps::GapReconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Block numbers fetched and committed together.
    pub chunk_size: u64,
    /// Disjoint sub-ranges of the forward range processed concurrently.
    pub workers: u64,
}

impl EngineConfig {
    pub fn new(chunk_size: u64, workers: u64) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::Config("chunk_size must be positive".to_string()));
        }
        if workers == 0 {
            return Err(IngestError::Config("workers must be positive".to_string()));
        }
        if usize::try_from(chunk_size).is_err() {
            return Err(IngestError::Config(format!(
                "chunk_size {chunk_size} exceeds the platform word size"
            )));
        }
        Ok(Self {
            chunk_size,
            workers,
        })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, IngestError> {
        Self::new(config.chunk_size, config.workers)
    }

    /// Gaps per backfill chunk. A size the platform can't index means one chunk.
    fn gap_chunk_len(&self) -> usize {
        usize::try_from(self.chunk_size).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    ReconcileGaps,
    ForwardFill,
    Done,
    Failed,
}

/// What one worker committed.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    chunks_committed: u64,
    blocks: u64,
    transactions: u64,
    cancelled: bool,
}

impl Tally {
    fn add(&mut self, other: Tally) {
        self.chunks_committed += other.chunks_committed;
        self.blocks += other.blocks;
        self.transactions += other.transactions;
        self.cancelled |= other.cancelled;
    }

    fn committed(&mut self, outcome: BatchOutcome) {
        self.chunks_committed += 1;
        self.blocks += outcome.blocks;
        self.transactions += outcome.transactions;
    }
}

/// Brings the mirror up to the node's frontier.
///
/// A run reconciles the gaps below the highest persisted block, then
/// forward-fills `(prior_max, frontier]` in chunks. Each chunk is committed
/// as one unit once all of its blocks have been fetched. A block that can't
/// be fetched or decoded, or a chunk that can't be committed, is recorded in
/// the [`InsertionErrorLog`] and the run moves on.
pub struct IngestionEngine<S, C> {
    storage: Arc<S>,
    client: Arc<C>,
    config: EngineConfig,
    errors: Arc<InsertionErrorLog>,
    cancellation: CancellationToken,
    state: watch::Sender<EngineState>,
}

impl<S, C> IngestionEngine<S, C>
where
    S: LedgerStore,
    C: ChainClient,
{
    pub fn new(
        storage: Arc<S>,
        client: Arc<C>,
        config: EngineConfig,
        errors: Arc<InsertionErrorLog>,
        cancellation: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Init);
        Self {
            storage,
            client,
            config,
            errors,
            cancellation,
            state,
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    fn enter(&self, state: EngineState) {
        debug!("Ingestion state: {:?}", state);
        self.state.send_replace(state);
    }

    pub async fn run(&self) -> Result<RunReport, IngestError> {
        let started_at = Utc::now();
        let fetch_errors_before = self.errors.fetch_errors();
        let insertion_errors_before = self.errors.insertion_errors();

        self.enter(EngineState::Init);
        let (existing, remote_frontier) = match self.init().await {
            Ok(found) => found,
            Err(e) => {
                error!("Ingestion can't start: {}", e);
                self.enter(EngineState::Failed);
                return Err(e);
            }
        };

        let reconciler = GapReconciler::new(&existing);
        let prior_max = reconciler.prior_max();
        let mut tally = Tally::default();

        self.enter(EngineState::ReconcileGaps);
        let gaps: Vec<u64> = reconciler.gaps().collect();
        if gaps.is_empty() {
            info!("No gaps below block {}", prior_max);
        } else {
            info!("{} blocks missing below block {}", gaps.len(), prior_max);
            tally.add(self.backfill(&gaps).await);
        }

        if !tally.cancelled {
            self.enter(EngineState::ForwardFill);
            if remote_frontier > prior_max {
                tally.add(self.forward_fill(prior_max + 1..=remote_frontier).await);
            } else {
                info!(
                    "Mirror is at block {}, node frontier is {}: nothing to forward-fill",
                    prior_max, remote_frontier
                );
            }
        }

        self.enter(EngineState::Done);
        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            prior_max,
            remote_frontier,
            gaps: gaps.len() as u64,
            chunks_committed: tally.chunks_committed,
            blocks_inserted: tally.blocks,
            transactions_inserted: tally.transactions,
            fetch_errors: self.errors.fetch_errors() - fetch_errors_before,
            insertion_errors: self.errors.insertion_errors() - insertion_errors_before,
            cancelled: tally.cancelled,
        };
        report.log_summary();
        Ok(report)
    }

    async fn init(&self) -> Result<(Vec<u64>, u64), IngestError> {
        let existing = self.storage.get_existing_block_numbers().await?;
        info!("{} blocks already in the mirror", existing.len());

        let lowest = self.storage.get_lowest_persisted_timestamp().await?;
        let highest = self.storage.get_highest_persisted_timestamp().await?;
        if let (Some(lowest), Some(highest)) = (lowest, highest) {
            info!("Mirror spans {} to {}", lowest, highest);
        }

        let remote_frontier = self.client.fetch_highest_block_number().await?;
        info!("Node frontier is block {}", remote_frontier);

        Ok((existing, remote_frontier))
    }

    async fn backfill(&self, gaps: &[u64]) -> Tally {
        let mut tally = Tally::default();
        let chunks = gaps.chunks(self.config.gap_chunk_len());
        let total = chunks.len();
        for (i, chunk) in chunks.enumerate() {
            if self.cancellation.is_cancelled() {
                info!("Stop requested before gap {}", chunk[0]);
                tally.cancelled = true;
                break;
            }
            // Non-empty by construction of `chunks`.
            let bounds = chunk[0]..=chunk[chunk.len() - 1];
            info!(
                "Processing gap chunk {} of {} ({}..={})",
                i + 1,
                total,
                bounds.start(),
                bounds.end()
            );
            if let Some(outcome) = self.ingest_chunk(bounds, chunk.iter().copied()).await {
                tally.committed(outcome);
            }
        }
        tally
    }

    async fn forward_fill(&self, range: RangeInclusive<u64>) -> Tally {
        info!(
            "Forward-filling blocks {}..={}",
            range.start(),
            range.end()
        );

        let workers = partition_range(range, self.config.workers);
        let tallies = join_all(workers.into_iter().map(|part| self.fill_range(part))).await;

        let mut tally = Tally::default();
        for worker in tallies {
            tally.add(worker);
        }
        tally
    }

    async fn fill_range(&self, range: RangeInclusive<u64>) -> Tally {
        let mut tally = Tally::default();
        let total = chunk_count(&range, self.config.chunk_size);
        for (i, chunk) in chunk_bounds(range, self.config.chunk_size).enumerate() {
            if self.cancellation.is_cancelled() {
                info!("Stop requested before block {}", chunk.start());
                tally.cancelled = true;
                break;
            }
            info!(
                "Processing chunk {} of {} ({}..={})",
                i + 1,
                total,
                chunk.start(),
                chunk.end()
            );
            if let Some(outcome) = self.ingest_chunk(chunk.clone(), chunk).await {
                tally.committed(outcome);
            }
        }
        tally
    }

    /// Fetches every number, then commits the chunk. `None` if the commit
    /// failed.
    async fn ingest_chunk<I>(&self, bounds: RangeInclusive<u64>, numbers: I) -> Option<BatchOutcome>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut blocks: Vec<Block> = Vec::new();
        let mut transactions: Vec<Transaction> = Vec::new();

        for number in numbers {
            match self.fetch_decoded(number).await {
                Ok(Some((block, block_transactions))) => {
                    blocks.push(block);
                    transactions.extend(block_transactions);
                }
                Ok(None) => debug!("Block {} not available on the node yet", number),
                Err(e) => self.errors.record_fetch(number, &e),
            }
        }

        if blocks.is_empty() {
            warn!(
                "Nothing to commit for blocks {}..={}",
                bounds.start(),
                bounds.end()
            );
            return Some(BatchOutcome::default());
        }

        info!(
            "Committing {} blocks and {} transactions for {}..={}",
            blocks.len(),
            transactions.len(),
            bounds.start(),
            bounds.end()
        );
        match self.storage.insert_batch(&blocks, &transactions).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.errors.record_insertion(&bounds, &e);
                None
            }
        }
    }

    async fn fetch_decoded(
        &self,
        number: u64,
    ) -> Result<Option<(Block, Vec<Transaction>)>, IngestError> {
        let Some(raw) = self.client.fetch_block(number).await? else {
            return Ok(None);
        };

        let (block, transactions) = decode_block(&raw)?;
        if block.number != number {
            return Err(DecodeError::Mismatch {
                field: "number",
                expected: number.to_string(),
                found: block.number.to_string(),
            }
            .into());
        }
        Ok(Some((block, transactions)))
    }
}

/// Splits `range` into consecutive chunks of at most `size` numbers.
pub(crate) fn chunk_bounds(
    range: RangeInclusive<u64>,
    size: u64,
) -> impl Iterator<Item = RangeInclusive<u64>> {
    let (start, end) = range.into_inner();
    let mut next = (start <= end).then_some(start);
    std::iter::from_fn(move || {
        let first = next?;
        let last = first.saturating_add(size.saturating_sub(1)).min(end);
        next = (last < end).then(|| last + 1);
        Some(first..=last)
    })
}

pub(crate) fn chunk_count(range: &RangeInclusive<u64>, size: u64) -> u64 {
    if range.is_empty() || size == 0 {
        return 0;
    }
    (range.end() - range.start()) / size + 1
}

/// Splits `range` into at most `parts` disjoint contiguous sub-ranges of
/// near-equal length.
pub(crate) fn partition_range(range: RangeInclusive<u64>, parts: u64) -> Vec<RangeInclusive<u64>> {
    let (start, end) = range.into_inner();
    if start > end || parts == 0 {
        return Vec::new();
    }

    let total = end - start + 1;
    let parts = parts.min(total);
    let base = total / parts;
    let extra = total % parts;

    let mut ranges = Vec::with_capacity(parts as usize);
    let mut first = start;
    for i in 0..parts {
        let len = base + u64::from(i < extra);
        let last = first + len - 1;
        ranges.push(first..=last);
        first = last.saturating_add(1);
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_the_range_in_order() {
        let chunks: Vec<_> = chunk_bounds(6..=25, 10).collect();
        assert_eq!(chunks, vec![6..=15, 16..=25]);

        let chunks: Vec<_> = chunk_bounds(1..=7, 3).collect();
        assert_eq!(chunks, vec![1..=3, 4..=6, 7..=7]);
    }

    #[test]
    fn empty_range_has_no_chunks() {
        #[allow(clippy::reversed_empty_ranges)]
        let empty = 6..=5;
        assert_eq!(chunk_count(&empty, 10), 0);
        assert_eq!(chunk_bounds(empty, 10).count(), 0);
    }

    #[test]
    fn chunk_count_matches_chunks() {
        for (range, size) in [(1..=25, 10), (1..=30, 10), (7..=7, 3), (1..=10, 1)] {
            assert_eq!(
                chunk_count(&range, size),
                chunk_bounds(range, size).count() as u64
            );
        }
    }

    #[test]
    fn single_block_range() {
        let chunks: Vec<_> = chunk_bounds(u64::MAX..=u64::MAX, 10).collect();
        assert_eq!(chunks, vec![u64::MAX..=u64::MAX]);
    }

    #[test]
    fn partitions_are_disjoint_and_contiguous() {
        assert_eq!(partition_range(1..=10, 3), vec![1..=4, 5..=7, 8..=10]);
        assert_eq!(partition_range(1..=10, 1), vec![1..=10]);
    }

    #[test]
    fn more_workers_than_blocks() {
        assert_eq!(partition_range(4..=5, 8), vec![4..=4, 5..=5]);
    }

    #[test]
    fn zero_sized_config_is_rejected() {
        assert!(matches!(
            EngineConfig::new(0, 1),
            Err(IngestError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::new(10, 0),
            Err(IngestError::Config(_))
        ));
        assert_eq!(
            EngineConfig::new(10, 2).unwrap(),
            EngineConfig {
                chunk_size: 10,
                workers: 2
            }
        );
    }

    #[test]
    fn gap_chunks_never_truncate_the_chunk_size() {
        let config = EngineConfig {
            chunk_size: u64::MAX,
            workers: 1,
        };
        assert_eq!(config.gap_chunk_len(), usize::MAX);

        let gaps: Vec<u64> = (1..=100).collect();
        assert_eq!(gaps.chunks(config.gap_chunk_len()).count(), 1);

        let config = EngineConfig::new(3, 1).unwrap();
        assert_eq!(gaps.chunks(config.gap_chunk_len()).count(), 34);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn any_chunk_size_fits_a_64_bit_platform() {
        assert!(EngineConfig::new(u64::MAX, 1).is_ok());
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn chunk_size_beyond_the_word_size_is_rejected() {
        assert!(matches!(
            EngineConfig::new(u64::from(u32::MAX) + 1, 1),
            Err(IngestError::Config(_))
        ));
    }
}
