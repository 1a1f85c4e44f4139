//! REST API types.
//!
//! Field names are snake_case, matching the CSV columns and the provider's
//! own vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::batch::{BatchReport, BatchSummary, CsvInfo, PreparedBatch};
use crate::emissions::{Estimate, EstimateRequest};
use crate::error::EmissionsError;
use crate::models::{RowResult, ShipmentRow, TransportMode};
use crate::validation::{ValidationError, ValidationSummary};

/// `weight_kg` as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WeightInput {
    Number(f64),
    Text(String),
}

impl WeightInput {
    /// Parsed weight; anything unparseable becomes NaN and fails validation.
    pub fn value(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }
}

/// Body of `POST /api/emissions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmissionsApiRequest {
    #[serde(default)]
    pub origin_address: String,
    #[serde(default)]
    pub destination_address: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub weight_kg: Option<WeightInput>,
}

impl EmissionsApiRequest {
    /// Check presence, then build the estimator request.
    pub fn into_request(self) -> Result<EstimateRequest, EmissionsError> {
        let mut missing = Vec::new();
        if self.origin_address.trim().is_empty() {
            missing.push("origin_address");
        }
        if self.destination_address.trim().is_empty() {
            missing.push("destination_address");
        }
        if self.mode.trim().is_empty() {
            missing.push("mode");
        }
        let weight = match &self.weight_kg {
            Some(WeightInput::Text(s)) if s.trim().is_empty() => None,
            other => other.as_ref().map(WeightInput::value),
        };
        if weight.is_none() {
            missing.push("weight_kg");
        }

        match weight {
            Some(weight_kg) if missing.is_empty() => Ok(EstimateRequest::new(
                self.origin_address,
                self.destination_address,
                self.mode,
                weight_kg,
            )),
            _ => Err(EmissionsError::InvalidRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Successful `POST /api/emissions` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionsSuccess {
    pub success: bool,
    pub co2e_kg: f64,
    pub co2e_unit: String,
    pub mode: TransportMode,
    pub weight_kg: f64,
    pub activity_id: String,
}

impl From<Estimate> for EmissionsSuccess {
    fn from(estimate: Estimate) -> Self {
        Self {
            success: true,
            co2e_kg: estimate.co2e_kg,
            co2e_unit: estimate.co2e_unit,
            mode: estimate.mode,
            weight_kg: estimate.weight_kg,
            activity_id: estimate.activity_id,
        }
    }
}

/// Failed `POST /api/emissions` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionsFailure {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub climatiq_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl EmissionsFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            climatiq_status: None,
            activity_id: None,
            details: None,
        }
    }
}

impl From<&EmissionsError> for EmissionsFailure {
    fn from(err: &EmissionsError) -> Self {
        match err {
            EmissionsError::Provider { status, message, activity_id, details } => Self {
                success: false,
                error: message.clone(),
                climatiq_status: Some(*status),
                activity_id: Some(activity_id.clone()),
                details: Some(details.clone()).filter(|d| !d.is_null()),
            },
            other => Self::new(other.to_string()),
        }
    }
}

/// Response of `POST /api/upload`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub rows: Vec<ShipmentRow>,
    pub errors: Vec<ValidationError>,
    pub total_rows: usize,
    pub truncated: bool,
    pub csv_info: CsvInfo,
    pub validation: ValidationSummary,
}

impl From<PreparedBatch> for UploadResponse {
    fn from(prepared: PreparedBatch) -> Self {
        Self {
            status: if prepared.errors.is_empty() { "ready" } else { "warning" }.to_string(),
            total_rows: prepared.csv_info.total_rows,
            truncated: prepared.csv_info.truncated,
            rows: prepared.rows,
            errors: prepared.errors,
            csv_info: prepared.csv_info,
            validation: prepared.validation,
        }
    }
}

/// Response of `POST /api/process`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub batch_id: String,
    pub rows: Vec<ShipmentRow>,
    pub errors: Vec<ValidationError>,
    pub results: Vec<RowResult>,
    pub summary: BatchSummary,
    pub total_rows: usize,
    pub truncated: bool,
}

impl From<BatchReport> for ProcessResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            batch_id: report.batch_id,
            rows: report.rows,
            errors: report.errors,
            results: report.results,
            summary: report.summary,
            total_rows: report.csv_info.total_rows,
            truncated: report.csv_info.truncated,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "success": false,
        "status": "error",
        "error": error,
    })
}
