//! Error types for the freight emissions pipeline.
//!
//! - [`ConfigError`] - Missing API key or broken selector table (fatal)
//! - [`FormatError`] - Unparseable or empty upload (fatal for the parse step)
//! - [`EmissionsError`] - Per-shipment estimation failures (recoverable)
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Field-level validation problems are not errors in this sense: they are
//! plain data ([`crate::validation::ValidationError`]) attached to a row.

use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The provider API key is not set.
    #[error("CLIMATIQ_API_KEY not found")]
    MissingApiKey,

    /// The selector table file could not be read.
    #[error("Cannot read emission factor table '{path}': {source}")]
    FactorsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The selector table file is not a valid table.
    #[error("Invalid emission factor table '{path}': {message}")]
    InvalidFactors { path: String, message: String },
}

// =============================================================================
// Format Errors
// =============================================================================

/// Errors that reject an uploaded file as a whole.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The file has no header line.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// The file has a header but no data rows.
    #[error("CSV file has no data rows")]
    EmptyFile,

    /// Malformed CSV record.
    #[error("Invalid CSV format at line {line}: {message}")]
    Malformed { line: u64, message: String },
}

// =============================================================================
// Emissions Errors
// =============================================================================

/// Errors from a single emissions estimate.
#[derive(Debug, Error)]
pub enum EmissionsError {
    /// Request rejected before reaching the provider.
    #[error("{0}")]
    InvalidRequest(String),

    /// The API key is missing.
    #[error("CLIMATIQ_API_KEY not found")]
    MissingApiKey,

    /// The provider could not be reached or its body could not be read.
    #[error("{0}")]
    Network(String),

    /// The provider answered without a usable estimate.
    #[error("{message}")]
    Provider {
        status: u16,
        message: String,
        activity_id: String,
        details: Value,
    },
}

impl EmissionsError {
    /// HTTP status surfaced to callers of the internal API.
    ///
    /// Provider statuses are passed through when they are errors themselves,
    /// otherwise (e.g. `200` without a `co2e` field) they become `502`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::MissingApiKey | Self::Network(_) => 500,
            Self::Provider { status, .. } if *status >= 400 => *status,
            Self::Provider { .. } => 502,
        }
    }

    /// Status reported by the provider, if it answered at all.
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for EmissionsError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Errors that abort a whole batch run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The upload could not be parsed.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Writing the export failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the export failed.
    #[error("Export error: {0}")]
    Export(#[from] csv::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Pipeline(PipelineError::Format(_)) | Self::BadRequest(_) => 400,
            Self::Pipeline(_) => 500,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for parsing.
pub type FormatResult<T> = Result<T, FormatError>;

/// Result type for a single estimate.
pub type EmissionsResult<T> = Result<T, EmissionsError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
