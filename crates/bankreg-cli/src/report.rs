//! The per-batch validation result written next to each report.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bankreg_core::{BatchOutcome, RecordAnnotation};
use bankreg_model::{BatchStatus, DataQualityError, ValidationError};
use bankreg_report::StructuralGapError;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationCounts {
    pub source_records: usize,
    pub canonical_records: usize,
    pub excluded_records: usize,
    pub data_quality_errors: usize,
    pub annotations: usize,
    pub validation_errors: usize,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport<'a> {
    pub timestamp: String,
    pub batch_id: &'a str,
    pub schema_file: String,
    pub is_valid: bool,
    pub status: BatchStatus,
    pub counts: ValidationCounts,
    pub data_quality_errors: &'a [DataQualityError],
    pub annotations: &'a [RecordAnnotation],
    pub validation_errors: &'a [ValidationError],
    pub structural_gap: Option<&'a StructuralGapError>,
    /// Set only when the report was written.
    pub xml_file: Option<String>,
}

impl<'a> ValidationReport<'a> {
    pub fn new(
        batch_id: &'a str,
        source_records: usize,
        schema_file: &Path,
        outcome: &'a BatchOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            batch_id,
            schema_file: file_name(schema_file),
            is_valid: outcome.is_compliant(),
            status: outcome.status,
            counts: ValidationCounts {
                source_records,
                canonical_records: outcome.canonical_count,
                excluded_records: outcome.excluded_count,
                data_quality_errors: outcome.data_quality_errors.len(),
                annotations: outcome.annotations.len(),
                validation_errors: outcome.validation_errors.len(),
            },
            data_quality_errors: &outcome.data_quality_errors,
            annotations: &outcome.annotations,
            validation_errors: &outcome.validation_errors,
            structural_gap: outcome.structural_gap.as_ref(),
            xml_file: None,
        }
    }

    #[must_use]
    pub fn with_xml_file(mut self, path: Option<&Path>) -> Self {
        self.xml_file = path.map(file_name);
        self
    }
}

pub fn report_path(output_dir: &Path, batch_id: &str) -> PathBuf {
    output_dir.join(format!("{batch_id}_report.xml"))
}

pub fn validation_path(output_dir: &Path, batch_id: &str) -> PathBuf {
    output_dir.join(format!("{batch_id}_validation.json"))
}

pub fn write_validation_report(path: &Path, report: &ValidationReport<'_>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let mut json = serde_json::to_string_pretty(report).context("serialize validation result")?;
    json.push('\n');
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
