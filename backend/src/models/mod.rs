//! Domain models for the freight emissions pipeline.
//!
//! - [`ShipmentRow`] - One parsed line of the uploaded manifest
//! - [`TransportMode`] - Air, sea, road or rail
//! - [`EmissionFactorSelector`] - Provider rule chosen for a mode
//! - [`WeightUnit`] - Unit a selector expects its weight in
//! - [`RowStatus`] / [`RowResult`] - Per-row processing outcome

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Shipment Row
// =============================================================================

/// One line of the uploaded freight manifest.
///
/// Every field is kept as text exactly as parsed; `weight_kg` is only
/// converted to a number once the row has been validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShipmentRow {
    pub shipment_id: String,
    pub origin_address: String,
    pub destination_address: String,
    pub mode: String,
    pub weight_kg: String,
}

impl ShipmentRow {
    /// Column names, in export order.
    pub const COLUMNS: [&'static str; 5] = [
        "shipment_id",
        "origin_address",
        "destination_address",
        "mode",
        "weight_kg",
    ];

    /// Parsed weight, if it is a finite positive number.
    pub fn weight(&self) -> Option<f64> {
        parse_weight(&self.weight_kg)
    }

    /// Parsed transport mode, if recognized.
    pub fn transport_mode(&self) -> Option<TransportMode> {
        self.mode.parse().ok()
    }

    /// Field values in [`Self::COLUMNS`] order.
    pub fn values(&self) -> [&str; 5] {
        [
            &self.shipment_id,
            &self.origin_address,
            &self.destination_address,
            &self.mode,
            &self.weight_kg,
        ]
    }
}

/// Parse a weight in kilograms. Rejects non-finite and non-positive values.
pub fn parse_weight(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite() && *w > 0.0)
}

// =============================================================================
// Transport Mode
// =============================================================================

/// Freight transport mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Air,
    Sea,
    Road,
    Rail,
}

impl TransportMode {
    /// All modes, in canonical order.
    pub const ALL: [TransportMode; 4] = [Self::Air, Self::Sea, Self::Road, Self::Rail];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Air => "air",
            Self::Sea => "sea",
            Self::Road => "road",
            Self::Rail => "rail",
        }
    }

    /// `"air, sea, road, rail"`, for error messages.
    pub fn valid_list() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "air" => Ok(Self::Air),
            "sea" => Ok(Self::Sea),
            "road" => Ok(Self::Road),
            "rail" => Ok(Self::Rail),
            _ => Err(format!(
                "Invalid mode: {}. Must be one of: {}",
                s,
                Self::valid_list()
            )),
        }
    }
}

// =============================================================================
// Emission Factor Selector
// =============================================================================

/// Unit a selector expects the shipment weight in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum WeightUnit {
    #[serde(rename = "kg")]
    Kilograms,
    #[serde(rename = "t")]
    #[default]
    Tonnes,
}

impl WeightUnit {
    /// Provider unit code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kilograms => "kg",
            Self::Tonnes => "t",
        }
    }

    /// Convert a weight in kilograms into this unit.
    pub fn from_kg(&self, kg: f64) -> f64 {
        match self {
            Self::Kilograms => kg,
            Self::Tonnes => kg / 1000.0,
        }
    }
}

/// Identifies the provider calculation rule used for a transport mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionFactorSelector {
    pub activity_id: String,
    pub data_version: String,
    #[serde(default)]
    pub weight_unit: WeightUnit,
}

impl EmissionFactorSelector {
    pub fn new(activity_id: impl Into<String>, data_version: impl Into<String>) -> Self {
        Self {
            activity_id: activity_id.into(),
            data_version: data_version.into(),
            weight_unit: WeightUnit::default(),
        }
    }

    pub fn with_weight_unit(mut self, unit: WeightUnit) -> Self {
        self.weight_unit = unit;
        self
    }
}

// =============================================================================
// Row Results
// =============================================================================

/// Processing status of one row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Error,
    /// Failed validation; never sent to the provider.
    Invalid,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error => "error",
            Self::Invalid => "invalid",
        }
    }

    /// Whether the row has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Invalid)
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RowResult {
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2e_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RowResult {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: RowStatus::Invalid,
            co2e_kg: None,
            error: Some(message.into()),
        }
    }

    pub fn success(co2e_kg: f64) -> Self {
        Self {
            status: RowStatus::Success,
            co2e_kg: Some(co2e_kg),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RowStatus::Error,
            co2e_kg: None,
            error: Some(message.into()),
        }
    }
}
