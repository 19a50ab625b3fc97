use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bankreg_cli::pipeline::{RunOptions, load_rules, run_batches, validate_file};
use bankreg_cli::types::{RunResult, ValidateResult};
use bankreg_standards::{StandardsRegistry, VerifySummary, standards_root};
use tracing::info_span;

use crate::cli::{RunArgs, StandardsArgs, ValidateArgs};

pub fn run_reports(args: &RunArgs) -> Result<RunResult> {
    let span = info_span!("run", input_dir = %args.input_dir.display());
    let _guard = span.enter();
    let standards = load_standards(args.standards.as_deref())?;
    let rules = load_rules(&standards)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.input_dir.join("output"));
    let options = RunOptions::new(&args.input_dir, output_dir)
        .with_batches(args.batches.clone())
        .with_abort_on_error(args.abort_on_error)
        .with_dry_run(args.dry_run);
    run_batches(&standards, &rules, &options)
}

pub fn run_validate(args: &ValidateArgs) -> Result<ValidateResult> {
    let standards = load_standards(args.standards.as_deref())?;
    validate_file(&standards, &args.xml)
}

pub fn run_standards(args: &StandardsArgs) -> Result<VerifySummary> {
    let dir = standards_dir(args.standards.as_deref());
    let (_, summary) = StandardsRegistry::verify_and_load(&dir)
        .with_context(|| format!("verify standards in {}", dir.display()))?;
    Ok(summary)
}

fn load_standards(explicit: Option<&Path>) -> Result<StandardsRegistry> {
    let dir = standards_dir(explicit);
    let (registry, _) = StandardsRegistry::verify_and_load(&dir)
        .with_context(|| format!("load standards from {}", dir.display()))?;
    Ok(registry)
}

fn standards_dir(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(standards_root, Path::to_path_buf)
}
