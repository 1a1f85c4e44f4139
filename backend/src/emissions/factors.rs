//! Per-mode emission factor selectors.
//!
//! The table is static process configuration: it is loaded once at startup
//! (built-in calibrated defaults, or a JSON file) and only read afterwards.
//! Finding working selectors is the job of [`super::calibration`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::models::{EmissionFactorSelector, TransportMode, WeightUnit};

/// Data version used by the calibrated selectors.
pub const CALIBRATED_DATA_VERSION: &str = "^21";

/// Mode → selector table.
///
/// Serialized as a JSON object keyed by lowercase mode:
///
/// ```json
/// { "air": { "activity_id": "freight_flight-route_type_na", "data_version": "^21", "weight_unit": "t" } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    try_from = "BTreeMap<TransportMode, EmissionFactorSelector>",
    into = "BTreeMap<TransportMode, EmissionFactorSelector>"
)]
pub struct SelectorTable {
    selectors: BTreeMap<TransportMode, EmissionFactorSelector>,
}

impl SelectorTable {
    /// Build a table, requiring one selector per mode.
    pub fn new(selectors: BTreeMap<TransportMode, EmissionFactorSelector>) -> Result<Self, String> {
        let missing: Vec<&str> = TransportMode::ALL
            .iter()
            .filter(|m| !selectors.contains_key(*m))
            .map(|m| m.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(format!("missing selector for: {}", missing.join(", ")));
        }

        if let Some((mode, _)) = selectors.iter().find(|(_, s)| s.activity_id.trim().is_empty()) {
            return Err(format!("empty activity_id for {}", mode));
        }

        Ok(Self { selectors })
    }

    /// Selectors found by calibration against the provider catalog.
    pub fn calibrated() -> Self {
        let selector = |id: &str| {
            EmissionFactorSelector::new(id, CALIBRATED_DATA_VERSION)
                .with_weight_unit(WeightUnit::Tonnes)
        };

        let selectors = BTreeMap::from([
            (TransportMode::Air, selector("freight_flight-route_type_na")),
            (TransportMode::Sea, selector("freight_sea-vessel_type_na")),
            (
                TransportMode::Road,
                selector("freight_vehicle-vehicle_type_hgv-fuel_source_na-distance_na-weight_or_capacity_na"),
            ),
            (TransportMode::Rail, selector("freight_train-route_type_na")),
        ]);

        Self { selectors }
    }

    /// Parse a table from JSON.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }

    /// Load a table from a JSON file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FactorsIo {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json(&content).map_err(|message| ConfigError::InvalidFactors {
            path: path.display().to_string(),
            message,
        })
    }

    /// Selector for a mode.
    pub fn get(&self, mode: TransportMode) -> &EmissionFactorSelector {
        // every constructor checks that all modes are present
        &self.selectors[&mode]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransportMode, &EmissionFactorSelector)> {
        self.selectors.iter()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl TryFrom<BTreeMap<TransportMode, EmissionFactorSelector>> for SelectorTable {
    type Error = String;

    fn try_from(selectors: BTreeMap<TransportMode, EmissionFactorSelector>) -> Result<Self, Self::Error> {
        Self::new(selectors)
    }
}

impl From<SelectorTable> for BTreeMap<TransportMode, EmissionFactorSelector> {
    fn from(table: SelectorTable) -> Self {
        table.selectors
    }
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self::calibrated()
    }
}
