//! Emissions estimation against the Climatiq API.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use freight_emissions::emissions::{EmissionsClient, EstimateRequest};
//!
//! let client = EmissionsClient::from_env()?;
//! let estimate = client
//!     .estimate(&EstimateRequest::new("Shanghai", "Rotterdam", "sea", 12_000.0))
//!     .await?;
//! println!("{} {}", estimate.co2e_kg, estimate.co2e_unit);
//! ```
//!
//! ## Distance
//!
//! Origin and destination are not geocoded. Every estimate uses the fixed
//! [`NOMINAL_DISTANCE_KM`], so results only vary with mode and weight. This is
//! a known approximation, not a bug to be patched over.

pub mod calibration;
pub mod client;
pub mod factors;

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::{EmissionsError, EmissionsResult};
use crate::models::{ShipmentRow, TransportMode};

pub use calibration::{discover_selectors, CalibrationReport, ModeCalibration};
pub use client::{EmissionsClient, EstimatePayload};
pub use factors::SelectorTable;

/// Placeholder distance applied to every shipment.
pub const NOMINAL_DISTANCE_KM: f64 = 1000.0;

/// Input of one estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EstimateRequest {
    pub origin_address: String,
    pub destination_address: String,
    pub mode: String,
    pub weight_kg: f64,
}

impl EstimateRequest {
    pub fn new(
        origin_address: impl Into<String>,
        destination_address: impl Into<String>,
        mode: impl Into<String>,
        weight_kg: f64,
    ) -> Self {
        Self {
            origin_address: origin_address.into(),
            destination_address: destination_address.into(),
            mode: mode.into(),
            weight_kg,
        }
    }

    /// Request for a validated shipment row.
    ///
    /// Returns `None` when the row's weight does not parse, which validation
    /// already rules out for rows that reach the batch processor.
    pub fn from_row(row: &ShipmentRow) -> Option<Self> {
        Some(Self::new(
            row.origin_address.trim(),
            row.destination_address.trim(),
            row.mode.trim(),
            row.weight()?,
        ))
    }

    /// Check the request before it goes anywhere near the provider.
    pub fn validate(&self) -> EmissionsResult<(TransportMode, f64)> {
        if self.origin_address.trim().is_empty()
            || self.destination_address.trim().is_empty()
            || self.mode.trim().is_empty()
        {
            return Err(EmissionsError::InvalidRequest(
                "Missing required fields: origin_address, destination_address, mode, weight_kg"
                    .to_string(),
            ));
        }

        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(EmissionsError::InvalidRequest(
                "weight_kg must be a positive number".to_string(),
            ));
        }

        let mode = self
            .mode
            .trim()
            .parse::<TransportMode>()
            .map_err(EmissionsError::InvalidRequest)?;

        Ok((mode, self.weight_kg))
    }
}

/// Successful estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Estimate {
    pub co2e_kg: f64,
    pub co2e_unit: String,
    pub mode: TransportMode,
    pub weight_kg: f64,
    pub activity_id: String,
}

/// Anything that can estimate a shipment's emissions.
///
/// Implemented by [`EmissionsClient`]; the batch processor only depends on
/// this trait.
pub trait EmissionsEstimator {
    fn estimate(
        &self,
        request: &EstimateRequest,
    ) -> impl Future<Output = EmissionsResult<Estimate>> + Send;
}
