//! CLI argument definitions for the regulatory report runner.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "bankreg",
    version,
    about = "Bank regulatory reporting - clean source data and produce conformant XML reports",
    long_about = "Clean bank source data, generate the regulatory XML report and validate it \
                  against the regulator schema.\n\n\
                  One report is produced per bank. A report is written only when its batch \
                  is fully compliant."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Process an input folder of section CSV files into reports.
    Run(RunArgs),

    /// Validate an existing XML report against the schema.
    Validate(ValidateArgs),

    /// Verify the standards directory and print what it declares.
    Standards(StandardsArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Folder containing one `<section>.csv` file per report section.
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Output directory for reports and validation results (default: <INPUT_DIR>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Standards directory (default: $BANKREG_STANDARDS_DIR, then the bundled standards).
    #[arg(long = "standards", value_name = "DIR")]
    pub standards: Option<PathBuf>,

    /// Only process the named batch; repeat for several.
    #[arg(long = "batch", value_name = "ID")]
    pub batches: Vec<String>,

    /// Stop a batch at its first rejected record instead of quarantining it.
    #[arg(long = "abort-on-error")]
    pub abort_on_error: bool,

    /// Process and report without writing output files.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// The XML report to check.
    #[arg(value_name = "XML")]
    pub xml: PathBuf,

    /// Standards directory (default: $BANKREG_STANDARDS_DIR, then the bundled standards).
    #[arg(long = "standards", value_name = "DIR")]
    pub standards: Option<PathBuf>,
}

#[derive(Parser)]
pub struct StandardsArgs {
    /// Standards directory (default: $BANKREG_STANDARDS_DIR, then the bundled standards).
    #[arg(long = "standards", value_name = "DIR")]
    pub standards: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
