//! JSON-Lines document store
//!
//! Reads a newline-delimited export of the behaviour collection, one JSON
//! document per line. Lines that are not UTF-8 or do not parse are skipped
//! with a warning.

use crate::source::traits::{DocumentStore, SourceDocument, SourceError, SourceResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// File-backed behaviour document store
pub struct JsonlDocumentStore {
    path: PathBuf,
}

impl JsonlDocumentStore {
    /// Checks that the export exists and remembers its path
    pub fn open(path: &Path) -> SourceResult<Self> {
        if !path.is_file() {
            return Err(SourceError::Unavailable {
                path: path.display().to_string(),
                reason: "file not found".to_string(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl DocumentStore for JsonlDocumentStore {
    fn find_by_collections(&self, collections: &[String]) -> SourceResult<Vec<SourceDocument>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut documents = Vec::new();
        let mut skipped = 0usize;
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        "Skipping non UTF-8 document at {}:{}: {}",
                        self.path.display(),
                        line_no,
                        e
                    );
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<SourceDocument>(line) {
                Ok(doc) => {
                    if collections.contains(&doc.collection) {
                        documents.push(doc);
                    }
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        "Skipping malformed document at {}:{}: {}",
                        self.path.display(),
                        line_no,
                        e
                    );
                }
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} malformed documents", skipped);
        }

        Ok(documents)
    }
}
