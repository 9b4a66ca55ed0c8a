use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};

use blockme_sqlx::StoreError;
use tracing::error;

use crate::interfaces::error::IngestError;

/// Events with this target are also written to the insertion error file.
pub const INSERTION_ERRORS_TARGET: &str = "blockme::insertion_errors";

/// Isolated failures of a run.
///
/// A failed block or chunk is logged here and skipped; the counts end up in
/// the run report so the numbers can be reconciled later.
#[derive(Debug, Default)]
pub struct InsertionErrorLog {
    fetch_errors: AtomicU64,
    insertion_errors: AtomicU64,
}

impl InsertionErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch(&self, number: u64, err: &IngestError) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
        error!(
            target: INSERTION_ERRORS_TARGET,
            block = number,
            "Block {} skipped: {}",
            number,
            err
        );
    }

    pub fn record_insertion(&self, numbers: &RangeInclusive<u64>, err: &StoreError) {
        self.insertion_errors.fetch_add(1, Ordering::Relaxed);
        error!(
            target: INSERTION_ERRORS_TARGET,
            first_block = numbers.start(),
            last_block = numbers.end(),
            "Chunk {}..={} not committed: {}",
            numbers.start(),
            numbers.end(),
            err
        );
    }

    pub fn fetch_errors(&self) -> u64 {
        self.fetch_errors.load(Ordering::Relaxed)
    }

    pub fn insertion_errors(&self) -> u64 {
        self.insertion_errors.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::error::ChainError;

    #[test]
    fn counts_each_kind_separately() {
        let log = InsertionErrorLog::new();

        log.record_fetch(7, &ChainError::Connectivity("refused".to_string()).into());
        log.record_fetch(8, &ChainError::Protocol("garbage".to_string()).into());
        log.record_insertion(&(1..=10), &StoreError::DuplicateKey("block_pkey".to_string()));

        assert_eq!(log.fetch_errors(), 2);
        assert_eq!(log.insertion_errors(), 1);
    }
}
