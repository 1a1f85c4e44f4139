//! Batch processing of shipment manifests.
//!
//! - [`processor`] - Sequential per-row state machine with progress reporting
//! - [`pipeline`] - Parse, validate, process and export in one call

pub mod pipeline;
pub mod processor;

pub use pipeline::{prepare, process_csv, run_batch, run_prepared, BatchReport, CsvInfo, PreparedBatch};
pub use processor::{percent, BatchProcessor, BatchProgress, BatchSummary};
