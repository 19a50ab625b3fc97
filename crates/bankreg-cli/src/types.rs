use std::path::PathBuf;

use bankreg_core::BatchOutcome;
use bankreg_model::ValidationError;

#[derive(Debug)]
pub struct RunResult {
    pub standards_dir: PathBuf,
    pub output_dir: PathBuf,
    pub batches: Vec<BatchSummary>,
    /// Problems outside any one batch, such as an unknown `--batch` id.
    pub errors: Vec<String>,
}

impl RunResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.batches.iter().any(|batch| !batch.outcome.is_compliant())
    }
}

#[derive(Debug)]
pub struct BatchSummary {
    pub batch_id: String,
    pub source_records: usize,
    pub outcome: BatchOutcome,
    pub report: Option<PathBuf>,
    pub validation: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ValidateResult {
    pub path: PathBuf,
    pub root_element: String,
    pub errors: Vec<ValidationError>,
}

impl ValidateResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
