//! Checkpoint ledger
//!
//! This module owns every piece of resumption state:
//! - The set of product ids already processed
//! - The success ledger, snapshotted periodically
//! - The failure ledger, appended to as failures happen
//!
//! No other component touches these files.

mod checkpoint;
pub mod files;

pub use checkpoint::{CheckpointLedger, CheckpointPaths};

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while reading or writing checkpoint files
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Extracted attribute name → value
pub type RecordFields = BTreeMap<String, String>;

/// A product whose page yielded usable data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessRecord {
    pub id: String,
    pub url: String,
    pub fields: RecordFields,
}

/// A product whose fetch or extraction failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub id: String,
    pub url: String,
    pub error: String,
}

/// Outcome counts for the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointCounters {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}
