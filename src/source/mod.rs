//! Document store access
//!
//! This module provides read-only access to the behaviour documents the
//! crawl universe is derived from:
//! - SQLite summary tables
//! - JSON-Lines exports of the behaviour collection

mod jsonl;
mod schema;
mod sqlite;
mod traits;

pub use jsonl::JsonlDocumentStore;
pub use schema::{create_summary_table, SUMMARY_COLUMNS};
pub use sqlite::SqliteDocumentStore;
pub use traits::{DocumentStore, SourceDocument, SourceError, SourceResult};

use crate::config::{SourceConfig, SourceKind};
use std::path::Path;

/// Opens the document store described by the configuration
///
/// A store that cannot be opened is fatal for the run: nothing can be
/// planned without it.
pub fn open_source(config: &SourceConfig) -> SourceResult<Box<dyn DocumentStore>> {
    let path = Path::new(&config.path);
    let store: Box<dyn DocumentStore> = match config.kind {
        SourceKind::Sqlite => Box::new(SqliteDocumentStore::open(path, &config.collection)?),
        SourceKind::Jsonl => Box::new(JsonlDocumentStore::open(path)?),
    };

    tracing::info!(
        "Connected to {:?} document store at {}",
        config.kind,
        config.path
    );
    Ok(store)
}
