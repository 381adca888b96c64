//! Document store trait and error types
//!
//! The crawler only ever reads from the document store: one query per run,
//! filtered by event category.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors that can occur while reading the document store
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Document store unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },

    #[error("Collection '{0}' does not exist in the document store")]
    MissingCollection(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for document store operations
pub type SourceResult<T> = Result<T, SourceError>;

/// The projection of a behaviour document the planner needs
///
/// Ids arrive as strings or numbers depending on the event producer;
/// both are normalized to strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceDocument {
    /// Event category tag
    #[serde(default)]
    pub collection: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub product_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub viewing_product_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub current_url: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub referrer_url: Option<String>,
}

/// Read-only access to behaviour documents
pub trait DocumentStore {
    /// Returns every document whose category is one of `collections`
    fn find_by_collections(&self, collections: &[String]) -> SourceResult<Vec<SourceDocument>>;
}

/// In-memory store, handy for embedding and tests
impl DocumentStore for Vec<SourceDocument> {
    fn find_by_collections(&self, collections: &[String]) -> SourceResult<Vec<SourceDocument>> {
        Ok(self
            .iter()
            .filter(|doc| collections.contains(&doc.collection))
            .cloned()
            .collect())
    }
}

/// Accepts a string, a number, or null; empty strings count as missing
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
