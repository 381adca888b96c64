//! Layout of the behaviour summary table
//!
//! Only the projection the planner reads is described here; the upstream
//! table may carry many more columns.

use rusqlite::Connection;

/// Columns selected from the summary table, in `SourceDocument` field order
pub const SUMMARY_COLUMNS: [&str; 5] = [
    "collection",
    "product_id",
    "viewing_product_id",
    "current_url",
    "referrer_url",
];

/// Creates a summary table with the projected columns if it does not exist
///
/// `table` must already be a validated identifier.
pub fn create_summary_table(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            product_id TEXT,
            viewing_product_id TEXT,
            current_url TEXT,
            referrer_url TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_collection ON {table}(collection);
        "
    ))
}

/// Checks whether `table` exists in the database
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
