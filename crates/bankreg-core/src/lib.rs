//! Batch orchestration for the regulatory report pipeline.
//!
//! [`process_batch`] cleans the raw records, generates the report document,
//! validates it and decides the [`BatchStatus`](bankreg_model::BatchStatus).
//! Delivery of compliant documents is left to the caller.

pub mod batch;
pub mod context;

pub use batch::{BatchOutcome, RecordAnnotation, batch_status, process_batch};
pub use context::BatchContext;
