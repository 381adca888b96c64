//! Thread-safe outcome accumulator with periodic snapshots
//!
//! Every mutation and every snapshot happens under one mutex, so the
//! counters, the processed set and the files written from them always
//! describe the same moment. The mutex is never held across an await.

use crate::config::OutputConfig;
use crate::ledger::files;
use crate::ledger::{CheckpointCounters, FailureRecord, LedgerResult, RecordFields, SuccessRecord};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locations of the files the ledger maintains
#[derive(Debug, Clone)]
pub struct CheckpointPaths {
    pub processed_ids: PathBuf,
    pub success: PathBuf,
    pub failure: PathBuf,
}

impl From<&OutputConfig> for CheckpointPaths {
    fn from(config: &OutputConfig) -> Self {
        Self {
            processed_ids: PathBuf::from(&config.processed_ids_path),
            success: PathBuf::from(&config.success_path),
            failure: PathBuf::from(&config.failed_path),
        }
    }
}

struct LedgerState {
    processed: HashSet<String>,
    /// Successes persisted by earlier runs, carried into every snapshot
    prior_successes: Vec<SuccessRecord>,
    successes: Vec<SuccessRecord>,
    failures: Vec<FailureRecord>,
    counters: CheckpointCounters,
    /// `processed` count at the last snapshot
    last_snapshot_at: u64,
    snapshots: u64,
}

/// Shared ledger of crawl outcomes
pub struct CheckpointLedger {
    paths: CheckpointPaths,
    fields: Vec<String>,
    interval: u64,
    state: Mutex<LedgerState>,
}

impl CheckpointLedger {
    /// Loads resumption state left by earlier runs
    ///
    /// An unreadable processed-id file is logged and treated as empty. A
    /// success ledger that exists but cannot be read is an error: the next
    /// snapshot would replace it and lose rows whose ids stay processed. The
    /// failure ledger is created with its header if missing; failing to do
    /// so is an error since failures could not be recorded durably.
    ///
    /// # Arguments
    ///
    /// * `paths` - Checkpoint file locations
    /// * `fields` - Declared attribute names, in success ledger column order
    /// * `interval` - Processed items between two snapshots
    pub fn load(paths: CheckpointPaths, fields: Vec<String>, interval: u64) -> LedgerResult<Self> {
        let processed = match files::read_processed_ids(&paths.processed_ids) {
            Ok(ids) => {
                if !ids.is_empty() {
                    tracing::info!("Loaded {} previously processed product ids", ids.len());
                }
                ids
            }
            Err(e) => {
                tracing::error!(
                    "Error loading processed ids from {}: {}. Starting from scratch.",
                    paths.processed_ids.display(),
                    e
                );
                HashSet::new()
            }
        };

        // Rows whose id never made it into the processed set get crawled
        // again, so keeping them would duplicate them.
        let prior_successes = files::read_success_csv(&paths.success, &fields)?
            .into_iter()
            .filter(|r| processed.contains(&r.id))
            .collect();

        files::ensure_failure_ledger(&paths.failure)?;

        Ok(Self {
            paths,
            fields,
            interval: interval.max(1),
            state: Mutex::new(LedgerState {
                processed,
                prior_successes,
                successes: Vec::new(),
                failures: Vec::new(),
                counters: CheckpointCounters::default(),
                last_snapshot_at: 0,
                snapshots: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // A panicking task cannot leave the state half-updated: every
        // critical section mutates in-memory data before any fallible I/O.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a product that yielded usable data
    pub fn record_success(&self, id: &str, fields: RecordFields, url: &str) {
        let mut state = self.lock();
        state.successes.push(SuccessRecord {
            id: id.to_string(),
            url: url.to_string(),
            fields,
        });
        state.processed.insert(id.to_string());
        state.counters.processed += 1;
        state.counters.succeeded += 1;
    }

    /// Records a failed product and appends it to the failure ledger at once
    ///
    /// The append happens inside the critical section so the on-disk row
    /// count never lags behind completed calls. An append error is logged;
    /// the failure is still kept in memory and counted.
    pub fn record_failure(&self, id: &str, url: &str, error: &str) {
        let mut state = self.lock();
        let record = FailureRecord {
            id: id.to_string(),
            url: url.to_string(),
            error: error.to_string(),
        };

        if let Err(e) = files::append_failure(&self.paths.failure, &record) {
            tracing::error!("Error writing failed record to {}: {}", self.paths.failure.display(), e);
        }

        state.failures.push(record);
        state.processed.insert(id.to_string());
        state.counters.processed += 1;
        state.counters.failed += 1;
    }

    /// Writes a snapshot if one is due, or unconditionally when `force` is set
    ///
    /// A snapshot is due each time the processed count reaches a new
    /// multiple of the interval. Snapshot errors are logged and the run
    /// carries on; the next snapshot supersedes the failed one.
    ///
    /// Returns whether a snapshot was written.
    pub fn maybe_checkpoint(&self, force: bool) -> bool {
        let mut state = self.lock();
        let processed = state.counters.processed;
        let due = processed > 0 && processed / self.interval > state.last_snapshot_at / self.interval;

        if !(due || force) {
            return false;
        }

        match self.snapshot(&state) {
            Ok(()) => {
                state.last_snapshot_at = processed;
                state.snapshots += 1;
                tracing::info!(
                    "Checkpoint {}: {} success | {} failed",
                    processed,
                    state.counters.succeeded,
                    state.counters.failed
                );
                true
            }
            Err(e) => {
                tracing::error!("Error saving checkpoint at {}: {}", processed, e);
                false
            }
        }
    }

    /// Forced snapshot at the end of a run
    pub fn flush_final(&self) -> bool {
        self.maybe_checkpoint(true)
    }

    /// Success ledger first, then processed ids: a crash in between leaves
    /// rows whose ids are not yet processed, which `load` drops and the next
    /// run re-crawls, instead of processed ids without their data.
    fn snapshot(&self, state: &LedgerState) -> LedgerResult<()> {
        files::write_success_csv(
            &self.paths.success,
            &self.fields,
            state.prior_successes.iter().chain(state.successes.iter()),
        )?;
        files::write_processed_ids(&self.paths.processed_ids, &state.processed)?;
        Ok(())
    }

    /// Counts for the current run
    pub fn counters(&self) -> CheckpointCounters {
        self.lock().counters
    }

    /// Number of snapshots written so far
    pub fn snapshot_count(&self) -> u64 {
        self.lock().snapshots
    }

    /// Ids processed by this and earlier runs
    pub fn processed_ids(&self) -> HashSet<String> {
        self.lock().processed.clone()
    }

    pub fn paths(&self) -> &CheckpointPaths {
        &self.paths
    }

    /// Successes and failures recorded during this run
    pub fn outcomes(&self) -> (Vec<SuccessRecord>, Vec<FailureRecord>) {
        let state = self.lock();
        (state.successes.clone(), state.failures.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn paths(dir: &TempDir) -> CheckpointPaths {
        CheckpointPaths {
            processed_ids: dir.path().join("processed.json"),
            success: dir.path().join("products.csv"),
            failure: dir.path().join("failed.csv"),
        }
    }

    fn name(value: &str) -> RecordFields {
        RecordFields::from([("product_name".to_string(), value.to_string())])
    }

    fn ledger(dir: &TempDir, interval: u64) -> CheckpointLedger {
        CheckpointLedger::load(paths(dir), vec!["product_name".to_string()], interval).unwrap()
    }

    fn data_rows(path: &std::path::Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count() - 1
    }

    #[test]
    fn test_load_creates_failure_ledger() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir, 100);

        assert_eq!(
            fs::read_to_string(&ledger.paths().failure).unwrap(),
            "product_id,url,error\n"
        );
        assert!(ledger.processed_ids().is_empty());
        assert_eq!(ledger.counters(), CheckpointCounters::default());
    }

    #[test]
    fn test_counters_and_processed_set() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir, 100);

        ledger.record_success("A", name("Ring"), "https://shop.test/a");
        ledger.record_failure("B", "https://shop.test/b", "HTTP error 404");

        let counters = ledger.counters();
        assert_eq!(counters.processed, 2);
        assert_eq!(counters.succeeded, 1);
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.processed, counters.succeeded + counters.failed);

        let ids = ledger.processed_ids();
        assert!(ids.contains("A") && ids.contains("B"));
    }

    #[test]
    fn test_failures_are_durable_before_any_checkpoint() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir, 100);

        ledger.record_success("A", name("Ring"), "https://shop.test/a");
        ledger.record_failure("B", "https://shop.test/b", "boom");
        ledger.record_failure("C", "https://shop.test/c", "boom");

        // No checkpoint has run: failures are on disk, successes are not
        assert_eq!(data_rows(&ledger.paths().failure), 2);
        assert!(!ledger.paths().success.exists());
        assert!(!ledger.paths().processed_ids.exists());
    }

    #[test]
    fn test_checkpoint_due_on_interval() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir, 2);

        ledger.record_success("A", name("a"), "u");
        assert!(!ledger.maybe_checkpoint(false));

        ledger.record_success("B", name("b"), "u");
        assert!(ledger.maybe_checkpoint(false));
        // Same count again is not a new multiple
        assert!(!ledger.maybe_checkpoint(false));

        ledger.record_success("C", name("c"), "u");
        assert!(!ledger.maybe_checkpoint(false));
        assert!(ledger.maybe_checkpoint(true));
        assert_eq!(ledger.snapshot_count(), 2);
    }

    #[test]
    fn test_checkpoint_catches_up_after_skipped_multiple() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir, 2);

        // Two workers finish before either checks: count jumps 1 -> 3
        ledger.record_success("A", name("a"), "u");
        ledger.record_success("B", name("b"), "u");
        ledger.record_success("C", name("c"), "u");
        assert!(ledger.maybe_checkpoint(false));
        assert!(!ledger.maybe_checkpoint(false));
    }

    #[test]
    fn test_snapshot_writes_success_and_processed_files() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir, 100);

        ledger.record_success("A", name("Ring"), "https://shop.test/a");
        ledger.record_failure("B", "https://shop.test/b", "HTTP error 404");
        assert!(ledger.flush_final());

        let success = fs::read_to_string(&ledger.paths().success).unwrap();
        assert_eq!(success, "product_id,url,product_name\nA,https://shop.test/a,Ring\n");

        let ids: Vec<String> =
            serde_json::from_str(&fs::read_to_string(&ledger.paths().processed_ids).unwrap())
                .unwrap();
        assert_eq!(ids, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_snapshot_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let paths = paths(&dir);
        // A directory where the success file should be makes the rename fail
        fs::create_dir(&paths.success).unwrap();
        let ledger = CheckpointLedger::load(paths, vec!["product_name".to_string()], 1).unwrap();

        ledger.record_success("A", name("Ring"), "u");
        assert!(!ledger.maybe_checkpoint(false));
        assert_eq!(ledger.snapshot_count(), 0);
        assert_eq!(ledger.counters().processed, 1);
    }

    #[test]
    fn test_resume_keeps_earlier_successes() {
        let dir = tempdir().unwrap();
        {
            let first = ledger(&dir, 100);
            first.record_success("A", name("Ring"), "https://shop.test/a");
            first.flush_final();
        }

        let second = ledger(&dir, 100);
        assert!(second.processed_ids().contains("A"));
        second.record_success("B", name("Necklace"), "https://shop.test/b");
        second.flush_final();

        let success = fs::read_to_string(&second.paths().success).unwrap();
        assert!(success.contains("A,https://shop.test/a,Ring"));
        assert!(success.contains("B,https://shop.test/b,Necklace"));
        // Only this run's outcome is reported
        assert_eq!(second.outcomes().0.len(), 1);
        assert_eq!(second.counters().succeeded, 1);
    }

    #[test]
    fn test_resume_drops_rows_without_processed_id() {
        let dir = tempdir().unwrap();
        let p = paths(&dir);
        fs::write(&p.success, "product_id,url,product_name\nA,u,Ring\nZ,u,Orphan\n").unwrap();
        fs::write(&p.processed_ids, r#"["A"]"#).unwrap();

        let ledger = ledger(&dir, 100);
        ledger.flush_final();

        let success = fs::read_to_string(&ledger.paths().success).unwrap();
        assert!(success.contains("A,u,Ring"));
        assert!(!success.contains("Orphan"));
    }

    #[test]
    fn test_resume_reads_uneven_success_rows() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("processed.json"), r#"["A","B"]"#).unwrap();
        fs::write(
            dir.path().join("products.csv"),
            "product_id,url,product_name\nA,u,Ring\nB,u,Necklace,extra\n",
        )
        .unwrap();

        let ledger = ledger(&dir, 100);
        ledger.record_success("C", name("Anklet"), "u");
        ledger.flush_final();

        let success = fs::read_to_string(&ledger.paths().success).unwrap();
        assert!(success.contains("A,u,Ring"));
        assert!(success.contains("B,u,Necklace"));
        assert!(success.contains("C,u,Anklet"));
    }

    #[test]
    fn test_unreadable_success_ledger_is_fatal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("processed.json"), r#"["A"]"#).unwrap();
        let original = "name,price\nRing,10\n";
        fs::write(dir.path().join("products.csv"), original).unwrap();

        let result =
            CheckpointLedger::load(paths(&dir), vec!["product_name".to_string()], 100);

        assert!(result.is_err());
        assert_eq!(
            fs::read_to_string(dir.path().join("products.csv")).unwrap(),
            original
        );
    }

    #[test]
    fn test_corrupt_processed_ids_start_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("processed.json"), "[oops").unwrap();
        let ledger = ledger(&dir, 100);
        assert!(ledger.processed_ids().is_empty());
    }

    #[test]
    fn test_concurrent_recording() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(ledger(&dir, 10));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let id = format!("{}-{}", t, i);
                        if i % 5 == 0 {
                            ledger.record_failure(&id, "u", "boom");
                        } else {
                            ledger.record_success(&id, name("x"), "u");
                        }
                        ledger.maybe_checkpoint(false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let counters = ledger.counters();
        assert_eq!(counters.processed, 200);
        assert_eq!(counters.failed, 40);
        assert_eq!(counters.succeeded, 160);
        assert_eq!(ledger.processed_ids().len(), 200);
        assert_eq!(data_rows(&ledger.paths().failure), 40);
        // Contended crossings may share one snapshot
        assert!((1..=20).contains(&ledger.snapshot_count()));
    }
}
