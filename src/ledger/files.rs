//! On-disk formats of the checkpoint files
//!
//! - processed ids: JSON array, replaced wholesale
//! - success ledger: CSV with a header, replaced wholesale
//! - failure ledger: CSV with a header, append-only
//!
//! Wholesale replacements go through a temporary file and a rename so a
//! reader never observes a half-written file.

use crate::ledger::{FailureRecord, LedgerError, LedgerResult, SuccessRecord};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Failure ledger columns
pub const FAILURE_HEADER: [&str; 3] = ["product_id", "url", "error"];

/// Creates the parent directory of `path` if needed
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Replaces `path` with `contents` via a sibling temporary file
pub fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    ensure_parent_dir(path)?;
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads the processed id set; a missing file is an empty set
pub fn read_processed_ids(path: &Path) -> LedgerResult<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let content = fs::read_to_string(path)?;
    let ids: Vec<String> = serde_json::from_str(&content)?;
    Ok(ids.into_iter().collect())
}

/// Serializes the processed id set as a sorted JSON array
pub fn write_processed_ids(path: &Path, ids: &HashSet<String>) -> LedgerResult<()> {
    let mut sorted: Vec<&String> = ids.iter().collect();
    sorted.sort();
    let content = serde_json::to_vec(&sorted)?;
    write_atomically(path, &content)?;
    Ok(())
}

/// Renders the success ledger: `product_id,url,<fields...>`
///
/// Attributes not in `fields` are dropped; missing ones are left empty.
pub fn render_success_csv<'a, I>(fields: &[String], records: I) -> LedgerResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a SuccessRecord>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["product_id", "url"];
    header.extend(fields.iter().map(String::as_str));
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![record.id.as_str(), record.url.as_str()];
        row.extend(
            fields
                .iter()
                .map(|f| record.fields.get(f).map(String::as_str).unwrap_or("")),
        );
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| LedgerError::Io(e.into_error()))
}

/// Writes the whole success ledger
pub fn write_success_csv<'a, I>(path: &Path, fields: &[String], records: I) -> LedgerResult<()>
where
    I: IntoIterator<Item = &'a SuccessRecord>,
{
    let content = render_success_csv(fields, records)?;
    write_atomically(path, &content)?;
    Ok(())
}

/// Reads a success ledger written by an earlier run
///
/// Columns are matched by header name, so a change in the declared field
/// list keeps whatever still matches. Rows with extra or missing trailing
/// cells are read as far as they go.
pub fn read_success_csv(path: &Path, fields: &[String]) -> LedgerResult<Vec<SuccessRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let (Some(id_col), Some(url_col)) = (position("product_id"), position("url")) else {
        return Err(csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "success ledger lacks product_id/url columns",
        ))
        .into());
    };
    let field_cols: Vec<(String, usize)> = fields
        .iter()
        .filter_map(|f| position(f).map(|col| (f.clone(), col)))
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let id = row.get(id_col).unwrap_or_default();
        if id.is_empty() {
            continue;
        }
        let fields = field_cols
            .iter()
            .filter_map(|(name, col)| {
                row.get(*col)
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.clone(), v.to_string()))
            })
            .collect();
        records.push(SuccessRecord {
            id: id.to_string(),
            url: row.get(url_col).unwrap_or_default().to_string(),
            fields,
        });
    }
    Ok(records)
}

/// Creates the failure ledger with its header if it is missing or empty
pub fn ensure_failure_ledger(path: &Path) -> LedgerResult<()> {
    let needs_header = match fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => return Err(e.into()),
    };

    if needs_header {
        ensure_parent_dir(path)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(FAILURE_HEADER)?;
        writer.flush()?;
    }
    Ok(())
}

/// Appends one row to the failure ledger and flushes it to disk
pub fn append_failure(path: &Path, record: &FailureRecord) -> LedgerResult<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record([&record.id, &record.url, &record.error])?;
    writer.flush()?;
    Ok(())
}
