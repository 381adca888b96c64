//! SQLite document store
//!
//! Reads behaviour documents from a summary table. The database is opened
//! read-only so a misconfigured path fails instead of creating an empty file.

use crate::source::schema::{table_exists, SUMMARY_COLUMNS};
use crate::source::traits::{DocumentStore, SourceDocument, SourceError, SourceResult};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags, Row};
use std::path::Path;

/// SQLite-backed behaviour document store
pub struct SqliteDocumentStore {
    conn: Connection,
    table: String,
}

impl SqliteDocumentStore {
    /// Opens an existing database and checks that `table` is present
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `table` - Name of the summary table (a validated identifier)
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteDocumentStore)` - Database opened and table found
    /// * `Err(SourceError)` - Database missing, unreadable, or without the table
    pub fn open(path: &Path, table: &str) -> SourceResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SourceError::Unavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_connection(conn, table)
    }

    /// Wraps an already open connection
    pub fn from_connection(conn: Connection, table: &str) -> SourceResult<Self> {
        if !table_exists(&conn, table)? {
            return Err(SourceError::MissingCollection(table.to_string()));
        }

        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn find_by_collections(&self, collections: &[String]) -> SourceResult<Vec<SourceDocument>> {
        if collections.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; collections.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE collection IN ({}) ORDER BY rowid",
            SUMMARY_COLUMNS.join(", "),
            self.table,
            placeholders
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params_from_iter(collections.iter()), |row| {
                Ok(SourceDocument {
                    collection: text_column(row, 0)?.unwrap_or_default(),
                    product_id: text_column(row, 1)?,
                    viewing_product_id: text_column(row, 2)?,
                    current_url: text_column(row, 3)?,
                    referrer_url: text_column(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }
}

/// Reads a column as text whatever its storage class; empty text is missing
fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            (!text.is_empty()).then_some(text)
        }
    })
}
