//! Run reporting
//!
//! This module turns a finished run into a human-readable summary:
//! - The end-of-run summary printed after a crawl
//! - On-disk statistics for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, LedgerStatistics};

use crate::ledger::{FailureRecord, SuccessRecord};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Final summary of a harvest run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Products in the universe
    pub universe_size: usize,

    /// Successes recorded by this run
    pub succeeded: usize,

    /// Failures recorded by this run
    pub failed: usize,

    /// Data rows in the failure ledger, earlier runs included
    pub total_failed_on_disk: u64,

    pub failure_path: PathBuf,

    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Builds the summary from this run's outcomes
    ///
    /// # Arguments
    ///
    /// * `universe_size` - Products in the universe
    /// * `successes` - Successes recorded by this run
    /// * `failures` - Failures recorded by this run
    /// * `failure_path` - Failure ledger whose rows are counted
    pub fn collect(
        universe_size: usize,
        successes: &[SuccessRecord],
        failures: &[FailureRecord],
        failure_path: &Path,
    ) -> Self {
        Self {
            universe_size,
            succeeded: successes.len(),
            failed: failures.len(),
            total_failed_on_disk: count_ledger_rows(failure_path),
            failure_path: failure_path.to_path_buf(),
            finished_at: Utc::now(),
        }
    }
}

/// Number of data rows in a CSV ledger
///
/// A missing or unreadable file counts as zero rows.
pub fn count_ledger_rows(path: &Path) -> u64 {
    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            tracing::debug!("Cannot read {}: {}", path.display(), e);
            return 0;
        }
    };
    reader.records().filter(|row| row.is_ok()).count() as u64
}

/// Prints the end-of-run summary to stdout and the log
pub fn print_summary(summary: &RunSummary) {
    tracing::info!(
        "Run finished: {} products in universe, {} succeeded and {} failed this run",
        summary.universe_size,
        summary.succeeded,
        summary.failed
    );

    println!("\n=== Harvest Summary ===\n");
    println!("  Finished at: {}", summary.finished_at.to_rfc3339());
    println!("  Products in universe: {}", summary.universe_size);
    println!("  Succeeded this run: {}", summary.succeeded);
    println!("  Failed this run: {}", summary.failed);
    println!(
        "  Failed products on record: {} (see {})",
        summary.total_failed_on_disk,
        summary.failure_path.display()
    );
}
