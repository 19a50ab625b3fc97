//! Reads section CSV files and splits them into per-bank batches.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bankreg_model::{RawRecord, RawValue};
use csv::ReaderBuilder;
use tracing::{debug, warn};

/// The records of one report, in the order they were read.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub records: Vec<RawRecord>,
}

/// Section files that were found and read.
#[derive(Debug, Default)]
pub struct IngestResult {
    pub batches: Vec<Batch>,
    pub files: Vec<PathBuf>,
    pub missing_sections: Vec<String>,
}

/// Reads `<section>.csv` for each section from `input_dir`.
///
/// Sections are read in the given order and batches are ordered by the
/// first appearance of their key. A row without a key value is an error.
pub fn ingest(input_dir: &Path, sections: &[String], key_field: &str) -> Result<IngestResult> {
    if !input_dir.is_dir() {
        bail!("input directory not found: {}", input_dir.display());
    }
    let mut result = IngestResult::default();
    let mut order: Vec<String> = Vec::new();
    let mut grouped: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();

    for section in sections {
        let path = input_dir.join(format!("{section}.csv"));
        if !path.is_file() {
            warn!(section = %section, "no input file for section");
            result.missing_sections.push(section.clone());
            continue;
        }
        let records = read_section(&path, section)?;
        debug!(section = %section, records = records.len(), "section read");
        for record in records {
            let key = batch_key(&record, key_field).with_context(|| {
                format!(
                    "{}: row {} has no value for {key_field}",
                    path.display(),
                    record.row
                )
            })?;
            if !grouped.contains_key(&key) {
                order.push(key.clone());
            }
            grouped.entry(key).or_default().push(record);
        }
        result.files.push(path);
    }

    result.batches = order
        .into_iter()
        .filter_map(|id| {
            grouped
                .remove(&id)
                .map(|records| Batch { id, records })
        })
        .collect();
    Ok(result)
}

/// Reads one section file; rows are numbered from 1 after the header.
pub fn read_section(path: &Path, section: &str) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("read header of {}", path.display()))?
        .iter()
        .map(|header| header.trim_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("read {} row {}", path.display(), index + 1))?;
        let mut record = RawRecord::new(index + 1, section);
        for (position, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = row.get(position).map_or(RawValue::Missing, cell_value);
            record.fields.insert(header.clone(), value);
        }
        records.push(record);
    }
    Ok(records)
}

fn cell_value(cell: &str) -> RawValue {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        RawValue::Missing
    } else {
        RawValue::Text(trimmed.to_string())
    }
}

fn batch_key(record: &RawRecord, key_field: &str) -> Option<String> {
    record
        .get(key_field)
        .and_then(RawValue::as_text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
