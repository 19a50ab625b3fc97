//! Shared CSV helpers for standards tables.

use std::collections::BTreeMap;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::StandardsError;

/// Read a CSV file into row maps keyed by trimmed header names.
///
/// A leading BOM on the first header is ignored and cell values are trimmed.
pub fn read_csv_rows(path: &Path) -> Result<Vec<BTreeMap<String, String>>, StandardsError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| StandardsError::csv(path, e.to_string()))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StandardsError::csv(path, e.to_string()))?
        .iter()
        .map(|header| header.trim_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StandardsError::csv(path, e.to_string()))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.clone(), value.trim().to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Get a required column value, failing on a missing or empty cell.
pub fn require(
    row: &BTreeMap<String, String>,
    key: &str,
    path: &Path,
    line: usize,
) -> Result<String, StandardsError> {
    get_optional(row, key).ok_or_else(|| {
        StandardsError::csv(path, format!("row {line}: missing value for column '{key}'"))
    })
}

/// Get an optional field value from a row (None if empty or missing).
pub fn get_optional(row: &BTreeMap<String, String>, key: &str) -> Option<String> {
    row.get(key).filter(|v| !v.is_empty()).cloned()
}

/// Split a semicolon-separated cell into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
