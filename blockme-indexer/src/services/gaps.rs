/// Finds the block numbers missing below the highest persisted one.
///
/// `existing` must be ascending and free of duplicates, which is what
/// `LedgerStore::get_existing_block_numbers` returns.
#[derive(Debug, Clone, Copy)]
pub struct GapReconciler<'a> {
    existing: &'a [u64],
}

impl<'a> GapReconciler<'a> {
    pub fn new(existing: &'a [u64]) -> Self {
        Self { existing }
    }

    /// Highest persisted number, `0` for an empty mirror.
    pub fn prior_max(&self) -> u64 {
        self.existing.last().copied().unwrap_or(0)
    }

    /// Missing numbers in `1..prior_max`, ascending.
    pub fn gaps(&self) -> Gaps<'a> {
        // Block 0 is never fetched, so a persisted 0 is not a candidate.
        let cursor = self.existing.partition_point(|&n| n < 1);
        Gaps {
            existing: self.existing,
            cursor,
            candidate: 1,
            end: self.prior_max(),
        }
    }
}

/// Two-cursor scan over the candidates and the persisted numbers.
#[derive(Debug, Clone)]
pub struct Gaps<'a> {
    existing: &'a [u64],
    cursor: usize,
    candidate: u64,
    end: u64,
}

impl Iterator for Gaps<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        while self.candidate < self.end {
            let candidate = self.candidate;
            self.candidate += 1;

            if self.existing.get(self.cursor) == Some(&candidate) {
                self.cursor += 1;
            } else {
                return Some(candidate);
            }
        }
        None
    }
}
