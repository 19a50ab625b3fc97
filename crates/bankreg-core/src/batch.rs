//! One batch through the pipeline.
//!
//! Stages run in order with a barrier between each: the rule engine, then
//! the generator, then the validator. A structural gap stops the batch
//! before validation. Under the abort policy a hard record failure stops it
//! before generation.

use std::time::Instant;

use bankreg_model::{
    Annotation, BatchStatus, DataQualityError, RawRecord, ReportDocument, RowIndex,
    ValidationError,
};
use bankreg_report::{StructuralGapError, generate};
use bankreg_transform::clean_with_options;
use bankreg_validate::validate;
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::context::BatchContext;

/// A soft-rule finding with the record it was attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordAnnotation {
    pub row: RowIndex,
    pub section: String,
    #[serde(flatten)]
    pub annotation: Annotation,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    /// Present whenever generation ran and succeeded, compliant or not.
    pub document: Option<ReportDocument>,
    pub canonical_count: usize,
    pub excluded_count: usize,
    pub data_quality_errors: Vec<DataQualityError>,
    pub annotations: Vec<RecordAnnotation>,
    pub validation_errors: Vec<ValidationError>,
    pub structural_gap: Option<StructuralGapError>,
}

impl BatchOutcome {
    pub fn is_compliant(&self) -> bool {
        self.status.is_compliant()
    }

    /// The document, only when it may be delivered.
    pub fn deliverable(&self) -> Option<&ReportDocument> {
        self.document.as_ref().filter(|_| self.is_compliant())
    }
}

/// Status precedence: data quality, then gap, then validation.
pub fn batch_status(
    data_quality_errors: &[DataQualityError],
    structural_gap: Option<&StructuralGapError>,
    validation_errors: &[ValidationError],
) -> BatchStatus {
    if !data_quality_errors.is_empty() {
        BatchStatus::RejectedDataQuality
    } else if structural_gap.is_some() {
        BatchStatus::Aborted
    } else if !validation_errors.is_empty() {
        BatchStatus::RejectedStructural
    } else {
        BatchStatus::Compliant
    }
}

pub fn process_batch(raw: &[RawRecord], context: &BatchContext<'_>) -> BatchOutcome {
    let span = info_span!("batch", batch_id = %context.batch_id, records = raw.len());
    let _guard = span.enter();
    let start = Instant::now();

    let cleaned = clean_with_options(raw, context.rules, context.options);
    let annotations: Vec<RecordAnnotation> = cleaned
        .annotations()
        .map(|(record, annotation)| RecordAnnotation {
            row: record.row(),
            section: record.section().to_string(),
            annotation: annotation.clone(),
        })
        .collect();

    let mut document = None;
    let mut structural_gap = None;
    let mut validation_errors = Vec::new();
    if !cleaned.halted {
        match generate(&cleaned.records, context.schema) {
            Ok(generated) => {
                validation_errors = validate(&generated, context.schema);
                document = Some(generated);
            }
            Err(gap) => {
                warn!(batch_id = %context.batch_id, path = %gap.path, "batch aborted on structural gap");
                structural_gap = Some(gap);
            }
        }
    }

    let status = batch_status(
        &cleaned.errors,
        structural_gap.as_ref(),
        &validation_errors,
    );
    info!(
        batch_id = %context.batch_id,
        status = %status,
        canonical = cleaned.records.len(),
        excluded = cleaned.excluded,
        data_quality_errors = cleaned.errors.len(),
        validation_errors = validation_errors.len(),
        duration_ms = start.elapsed().as_millis(),
        "batch complete"
    );

    BatchOutcome {
        status,
        document,
        canonical_count: cleaned.records.len(),
        excluded_count: cleaned.excluded,
        data_quality_errors: cleaned.errors,
        annotations,
        validation_errors,
        structural_gap,
    }
}

#[cfg(test)]
mod tests {
    use bankreg_model::{Constraint, Location};

    use super::*;

    fn dq() -> DataQualityError {
        DataQualityError {
            row: RowIndex(1),
            section: "bank".to_string(),
            field: None,
            rule: "r".to_string(),
            message: "bad".to_string(),
        }
    }

    fn gap() -> StructuralGapError {
        StructuralGapError {
            path: "Header/Name".to_string(),
            section: None,
            field: None,
            row: None,
        }
    }

    fn invalid() -> ValidationError {
        ValidationError::new(
            Location::root("Report"),
            Constraint::UndeclaredElement,
            "undeclared",
        )
    }

    #[test]
    fn data_quality_outranks_everything() {
        assert_eq!(
            batch_status(&[dq()], Some(&gap()), &[invalid()]),
            BatchStatus::RejectedDataQuality
        );
    }

    #[test]
    fn gap_outranks_validation() {
        assert_eq!(
            batch_status(&[], Some(&gap()), &[invalid()]),
            BatchStatus::Aborted
        );
        assert_eq!(
            batch_status(&[], None, &[invalid()]),
            BatchStatus::RejectedStructural
        );
        assert_eq!(batch_status(&[], None, &[]), BatchStatus::Compliant);
    }
}
