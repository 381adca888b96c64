//! Statistics from checkpoint files
//!
//! Reads the state a run leaves on disk, without touching the document store
//! or the network.

use crate::config::Config;
use crate::ledger::files::{read_processed_ids, read_success_csv};
use crate::planner::load_cached_universe;
use crate::report::count_ledger_rows;
use crate::HarvestError;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::Path;

/// Harvest progress as recorded on disk
#[derive(Debug, Clone)]
pub struct LedgerStatistics {
    /// Products in the cached universe, if a cache exists
    pub universe_size: Option<usize>,

    /// Products already processed
    pub processed: usize,

    /// Rows in the success ledger
    pub succeeded: usize,

    /// Rows in the failure ledger
    pub failed: u64,

    /// Universe products not processed yet
    pub remaining: Option<usize>,

    /// When the processed-id file was last rewritten
    pub last_checkpoint: Option<DateTime<Local>>,

    /// Failure counts by reason, most frequent first
    pub failure_reasons: Vec<(String, u64)>,
}

/// Loads statistics from the configured checkpoint files
///
/// # Arguments
///
/// * `config` - Harvest configuration naming the files
///
/// # Returns
///
/// * `Ok(LedgerStatistics)` - Statistics, with absent files counted as empty
/// * `Err(HarvestError)` - A present file could not be parsed
pub fn load_statistics(config: &Config) -> Result<LedgerStatistics, HarvestError> {
    let output = &config.output;

    let universe = load_cached_universe(Path::new(&output.universe_cache_path));
    let processed = read_processed_ids(Path::new(&output.processed_ids_path))?;
    let succeeded = read_success_csv(
        Path::new(&output.success_path),
        &config.extract.field_names(),
    )?
    .len();

    let failure_path = Path::new(&output.failed_path);
    let failed = count_ledger_rows(failure_path);

    let remaining = universe
        .as_ref()
        .map(|u| u.keys().filter(|id| !processed.contains(id.as_str())).count());

    let last_checkpoint = std::fs::metadata(&output.processed_ids_path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Local>::from);

    Ok(LedgerStatistics {
        universe_size: universe.map(|u| u.len()),
        processed: processed.len(),
        succeeded,
        failed,
        remaining,
        last_checkpoint,
        failure_reasons: failure_reasons(failure_path),
    })
}

fn failure_reasons(path: &Path) -> Vec<(String, u64)> {
    let Ok(mut reader) = csv::Reader::from_path(path) else {
        return Vec::new();
    };
    let error_col = match reader.headers() {
        Ok(headers) => headers.iter().position(|h| h == "error"),
        Err(_) => None,
    };
    let Some(error_col) = error_col else {
        return Vec::new();
    };

    let mut counts: HashMap<String, u64> = HashMap::new();
    for row in reader.records().flatten() {
        let reason = reason_category(row.get(error_col).unwrap_or_default());
        *counts.entry(reason).or_insert(0) += 1;
    }

    let mut reasons: Vec<_> = counts.into_iter().collect();
    reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    reasons
}

/// Groups a failure message into a short reason
fn reason_category(error: &str) -> String {
    if error.starts_with("HTTP error") {
        let status = error
            .rsplit("': ")
            .next()
            .and_then(|tail| tail.split_whitespace().next())
            .filter(|code| code.parse::<u16>().is_ok());
        match status {
            Some(code) => format!("HTTP {}", code),
            None => "HTTP error".to_string(),
        }
    } else if error.starts_with("Could not connect") {
        if error.contains("Request timeout") {
            "Timeout".to_string()
        } else {
            "Connection error".to_string()
        }
    } else if error.contains("not found for product_id") {
        "Data not found".to_string()
    } else if error.starts_with("Invalid URL") {
        "Invalid URL".to_string()
    } else {
        "Unexpected error".to_string()
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &LedgerStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    match stats.universe_size {
        Some(size) => println!("  Products in universe: {}", size),
        None => println!("  Products in universe: unknown (no cache yet)"),
    }
    println!("  Processed: {}", stats.processed);
    println!("  Succeeded: {}", stats.succeeded);
    println!("  Failed (on record): {}", stats.failed);
    if let Some(remaining) = stats.remaining {
        println!("  Remaining: {}", remaining);
    }
    if let Some(at) = stats.last_checkpoint {
        println!("  Last checkpoint: {}", at.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(size) = stats.universe_size.filter(|s| *s > 0) {
        println!(
            "  Progress: {:.1}%",
            stats.processed as f64 / size as f64 * 100.0
        );
    }
    println!();

    if !stats.failure_reasons.is_empty() {
        println!("Failures by Reason:");
        for (reason, count) in &stats.failure_reasons {
            println!("  {}: {}", reason, count);
        }
    }
}
