//! # Freight Emissions - CO2e estimates for shipment manifests
//!
//! Reads a CSV of freight shipments, validates every row, asks the Climatiq
//! estimation API for the CO2e of each valid shipment one at a time, and
//! exports the rows with their results back to CSV.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Validator  │────▶│    Batch    │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (per row)  │     │ (sequential)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                     ┌─────────────┐     ┌─────────────┐            │
//!                     │  CSV Export │◀────│  Climatiq   │◀───────────┘
//!                     │  (dated)    │     │  /estimate  │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use freight_emissions::{process_csv, Settings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::from_env().unwrap();
//!     let bytes = std::fs::read("shipments.csv").unwrap();
//!     let report = process_csv(&bytes, &settings, |_| {}).await.unwrap();
//!     println!("{} succeeded", report.summary.succeeded);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Shipment rows, transport modes, row results
//! - [`parser`] - CSV parsing with encoding and delimiter detection
//! - [`validation`] - Field-level row validation
//! - [`emissions`] - Climatiq client, selector table, calibration
//! - [`batch`] - Sequential batch processing and the end-to-end pipeline
//! - [`export`] - CSV export
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing and validation
pub mod parser;
pub mod validation;

// Estimation
pub mod batch;
pub mod emissions;

// Output
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    EmissionsError,
    FormatError,
    PipelineError,
    ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    EmissionFactorSelector,
    RowResult,
    RowStatus,
    ShipmentRow,
    TransportMode,
    WeightUnit,
};

// =============================================================================
// Re-exports - Parsing and validation
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_shipments,
    parse_shipments_file,
    ParsedShipments,
    MAX_ROWS,
};

pub use validation::{validate_all, validate_row, ValidationError, ValidationSummary};

// =============================================================================
// Re-exports - Emissions
// =============================================================================

pub use emissions::{
    discover_selectors,
    CalibrationReport,
    EmissionsClient,
    EmissionsEstimator,
    Estimate,
    EstimateRequest,
    SelectorTable,
    NOMINAL_DISTANCE_KM,
};

// =============================================================================
// Re-exports - Batch
// =============================================================================

pub use batch::{
    prepare,
    process_csv,
    run_batch,
    BatchProcessor,
    BatchProgress,
    BatchReport,
    BatchSummary,
    PreparedBatch,
};

// =============================================================================
// Re-exports - Export and config
// =============================================================================

pub use export::{export_filename, export_to_csv, merge_results, shipment_records, write_export};

pub use config::Settings;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
