//! Runs every batch of an input folder and writes its results.
//!
//! 1. **Ingest**: read section files and split them by the batch key
//! 2. **Process**: clean, generate and validate each batch
//! 3. **Output**: write the report when compliant, and the validation result always

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use bankreg_core::{BatchContext, process_batch};
use bankreg_report::{read_document_file, write_document};
use bankreg_standards::StandardsRegistry;
use bankreg_transform::{CleanOptions, ErrorPolicy, RuleSet};
use bankreg_validate::validate;
use tracing::{info, info_span, warn};

use crate::ingest::{Batch, ingest};
use crate::report::{ValidationReport, report_path, validation_path, write_validation_report};
use crate::types::{BatchSummary, RunResult, ValidateResult};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Empty means every batch.
    pub batches: Vec<String>,
    pub abort_on_error: bool,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            batches: Vec::new(),
            abort_on_error: false,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_batches(mut self, batches: Vec<String>) -> Self {
        self.batches = batches;
        self
    }

    #[must_use]
    pub fn with_abort_on_error(mut self, enable: bool) -> Self {
        self.abort_on_error = enable;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, enable: bool) -> Self {
        self.dry_run = enable;
        self
    }
}

/// The rule set named by the standards manifest, or an empty one.
pub fn load_rules(standards: &StandardsRegistry) -> Result<RuleSet> {
    match &standards.rules_path {
        Some(path) => RuleSet::load(path, &standards.vocabularies, Some(&standards.schema))
            .with_context(|| format!("load rules from {}", path.display())),
        None => RuleSet::new(Vec::new()).context("build empty rule set"),
    }
}

pub fn run_batches(
    standards: &StandardsRegistry,
    rules: &RuleSet,
    options: &RunOptions,
) -> Result<RunResult> {
    let sections: Vec<String> = standards
        .schema
        .bindings()
        .sections()
        .iter()
        .map(|section| section.section.clone())
        .collect();

    let ingest_span = info_span!("ingest", input_dir = %options.input_dir.display());
    let ingest_start = Instant::now();
    let ingested = ingest_span
        .in_scope(|| ingest(&options.input_dir, &sections, standards.batch_key()))?;
    info!(
        files = ingested.files.len(),
        batches = ingested.batches.len(),
        duration_ms = ingest_start.elapsed().as_millis(),
        "ingest complete"
    );

    let mut errors = Vec::new();
    let selected = select_batches(ingested.batches, &options.batches, &mut errors);
    if selected.is_empty() && errors.is_empty() {
        errors.push(format!(
            "no records found in {}",
            options.input_dir.display()
        ));
    }

    let mut clean_options = rules.options();
    if options.abort_on_error {
        clean_options = CleanOptions {
            error_policy: ErrorPolicy::AbortBatch,
        };
    }

    let mut batches = Vec::with_capacity(selected.len());
    for batch in selected {
        let context = BatchContext::new(&batch.id, rules, &standards.schema)
            .with_options(clean_options);
        let outcome = process_batch(&batch.records, &context);
        let mut summary = BatchSummary {
            batch_id: batch.id.clone(),
            source_records: batch.records.len(),
            outcome,
            report: None,
            validation: None,
        };
        if !options.dry_run {
            write_outputs(&mut summary, &standards.schema_path, &options.output_dir)?;
        }
        if !summary.outcome.is_compliant() {
            warn!(batch_id = %summary.batch_id, status = %summary.outcome.status, "batch not compliant");
        }
        batches.push(summary);
    }

    Ok(RunResult {
        standards_dir: standards.standards_dir.clone(),
        output_dir: options.output_dir.clone(),
        batches,
        errors,
    })
}

/// Keeps requested batches in input order; unknown ids become errors.
fn select_batches(batches: Vec<Batch>, wanted: &[String], errors: &mut Vec<String>) -> Vec<Batch> {
    if wanted.is_empty() {
        return batches;
    }
    for id in wanted {
        if !batches.iter().any(|batch| &batch.id == id) {
            errors.push(format!("batch {id} not found in input"));
        }
    }
    batches
        .into_iter()
        .filter(|batch| wanted.contains(&batch.id))
        .collect()
}

fn write_outputs(summary: &mut BatchSummary, schema_path: &Path, output_dir: &Path) -> Result<()> {
    if let Some(document) = summary.outcome.deliverable() {
        let path = report_path(output_dir, &summary.batch_id);
        write_document(&path, document).with_context(|| format!("write {}", path.display()))?;
        info!(batch_id = %summary.batch_id, path = %path.display(), "report written");
        summary.report = Some(path);
    }
    let path = validation_path(output_dir, &summary.batch_id);
    let report = ValidationReport::new(
        &summary.batch_id,
        summary.source_records,
        schema_path,
        &summary.outcome,
    )
    .with_xml_file(summary.report.as_deref());
    write_validation_report(&path, &report)?;
    summary.validation = Some(path);
    Ok(())
}

/// Parses an existing report and validates it against the loaded schema.
pub fn validate_file(standards: &StandardsRegistry, path: &Path) -> Result<ValidateResult> {
    let document =
        read_document_file(path).with_context(|| format!("read {}", path.display()))?;
    let errors = validate(&document, &standards.schema);
    Ok(ValidateResult {
        path: path.to_path_buf(),
        root_element: document.root().name.clone(),
        errors,
    })
}
