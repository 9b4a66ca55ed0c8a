use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Terminal summary of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Highest persisted number when the run started, `0` for an empty mirror.
    pub prior_max: u64,
    pub remote_frontier: u64,
    /// Missing numbers found below `prior_max`.
    pub gaps: u64,
    pub chunks_committed: u64,
    pub blocks_inserted: u64,
    pub transactions_inserted: u64,
    pub fetch_errors: u64,
    pub insertion_errors: u64,
    /// The run stopped at a chunk boundary before all work was done.
    pub cancelled: bool,
}

impl RunReport {
    pub fn error_count(&self) -> u64 {
        self.fetch_errors + self.insertion_errors
    }

    /// Wall-clock duration as `HH:MM:SS`.
    pub fn runtime(&self) -> String {
        let seconds = (self.finished_at - self.started_at).num_seconds().max(0);
        format!(
            "{:02}:{:02}:{:02}",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60
        )
    }

    pub fn log_summary(&self) {
        info!(
            "Run finished in {} ({} -> {}). Blocks inserted: {}, transactions inserted: {}, chunks committed: {}, gaps found: {}.",
            self.runtime(),
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.finished_at.format("%Y-%m-%d %H:%M:%S"),
            self.blocks_inserted,
            self.transactions_inserted,
            self.chunks_committed,
            self.gaps
        );

        if self.cancelled {
            warn!("Run was cancelled before reaching block {}", self.remote_frontier);
        }

        if self.error_count() > 0 {
            warn!(
                "{} errors during the run ({} blocks skipped, {} chunks not committed), see the insertion error log",
                self.error_count(),
                self.fetch_errors,
                self.insertion_errors
            );
        } else {
            info!("No insertion errors.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn report(elapsed: Duration) -> RunReport {
        let started_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        RunReport {
            started_at,
            finished_at: started_at + elapsed,
            prior_max: 10,
            remote_frontier: 20,
            gaps: 2,
            chunks_committed: 3,
            blocks_inserted: 12,
            transactions_inserted: 40,
            fetch_errors: 1,
            insertion_errors: 2,
            cancelled: false,
        }
    }

    #[test]
    fn runtime_is_hours_minutes_seconds() {
        assert_eq!(report(Duration::seconds(0)).runtime(), "00:00:00");
        assert_eq!(report(Duration::seconds(3_725)).runtime(), "01:02:05");
        assert_eq!(report(Duration::hours(27)).runtime(), "27:00:00");
    }

    #[test]
    fn error_count_adds_both_kinds() {
        assert_eq!(report(Duration::seconds(1)).error_count(), 3);
    }
}
