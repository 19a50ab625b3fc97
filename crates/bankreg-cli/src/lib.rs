//! Library side of the `bankreg` command: ingestion, the batch run and
//! its on-disk results, and logging setup.

pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod types;
