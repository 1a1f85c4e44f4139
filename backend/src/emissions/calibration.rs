//! Offline discovery of working emission factor selectors.
//!
//! For every mode the provider catalog is searched for freight factors, and
//! each candidate is tried with a small test estimate until one returns a
//! CO2e value. The result can be saved as a selector table and loaded with
//! `EMISSION_FACTORS_FILE`. Nothing here runs while processing shipments.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::client::{EmissionFactorRef, EstimatePayload, WeightDistanceParameters};
use super::{EmissionsClient, SelectorTable};
use crate::api::logs::{log_info, log_success, log_warning};
use crate::models::{EmissionFactorSelector, TransportMode, WeightUnit};

/// Data version searched and tested during calibration.
pub const CALIBRATION_DATA_VERSION: &str = "^6";

/// Candidates requested per search.
const RESULTS_PER_PAGE: &str = "10";

/// Search query for a mode.
pub fn search_query(mode: TransportMode) -> &'static str {
    match mode {
        TransportMode::Air => "freight flight",
        TransportMode::Sea => "freight sea",
        TransportMode::Road => "freight vehicle",
        TransportMode::Rail => "freight train",
    }
}

/// Outcome for one mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ModeCalibration {
    Found {
        activity_id: String,
        name: Option<String>,
        source: Option<String>,
        region: Option<String>,
        co2e_test: f64,
        co2e_unit: String,
    },
    NotFound {
        error: String,
        candidates_tested: usize,
    },
}

impl ModeCalibration {
    pub fn activity_id(&self) -> Option<&str> {
        match self {
            Self::Found { activity_id, .. } => Some(activity_id),
            Self::NotFound { .. } => None,
        }
    }
}

/// Outcome for all modes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationReport {
    pub results: BTreeMap<TransportMode, ModeCalibration>,
    pub recommended_ids: BTreeMap<TransportMode, Option<String>>,
}

impl CalibrationReport {
    fn new(results: BTreeMap<TransportMode, ModeCalibration>) -> Self {
        let recommended_ids = results
            .iter()
            .map(|(mode, r)| (*mode, r.activity_id().map(str::to_string)))
            .collect();
        Self { results, recommended_ids }
    }

    /// Selector table built from the discovered ids, if every mode has one.
    pub fn selector_table(&self) -> Option<SelectorTable> {
        let selectors = self
            .recommended_ids
            .iter()
            .map(|(mode, id)| {
                let selector = EmissionFactorSelector::new(id.clone()?, CALIBRATION_DATA_VERSION)
                    .with_weight_unit(WeightUnit::Tonnes);
                Some((*mode, selector))
            })
            .collect::<Option<BTreeMap<_, _>>>()?;

        SelectorTable::new(selectors).ok()
    }
}

/// Search the catalog and test candidates for every mode.
pub async fn discover_selectors(client: &EmissionsClient) -> CalibrationReport {
    let mut results = BTreeMap::new();

    for mode in TransportMode::ALL {
        log_info(format!("🔎 Calibrating {} (\"{}\")", mode, search_query(mode)));
        let outcome = calibrate_mode(client, mode).await;

        match &outcome {
            ModeCalibration::Found { activity_id, co2e_test, co2e_unit, .. } => {
                log_success(format!("{}: {} ({} {})", mode, activity_id, co2e_test, co2e_unit));
            }
            ModeCalibration::NotFound { error, candidates_tested } => {
                log_warning(format!("{}: {} ({} tested)", mode, error, candidates_tested));
            }
        }

        results.insert(mode, outcome);
    }

    CalibrationReport::new(results)
}

async fn calibrate_mode(client: &EmissionsClient, mode: TransportMode) -> ModeCalibration {
    let query = [
        ("query", search_query(mode)),
        ("data_version", CALIBRATION_DATA_VERSION),
        ("results_per_page", RESULTS_PER_PAGE),
        ("unit_type", "WeightOverDistance"),
    ];

    let candidates = match client.search(&query).await {
        Ok(reply) => reply
            .body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Err(e) => {
            return ModeCalibration::NotFound {
                error: format!("Search failed: {}", e),
                candidates_tested: 0,
            }
        }
    };

    for candidate in &candidates {
        let Some(activity_id) = candidate.get("activity_id").and_then(Value::as_str) else {
            continue;
        };

        let payload = test_payload(activity_id);
        let Ok(reply) = client.post_estimate(&payload).await else {
            continue;
        };

        if let Some((co2e_test, co2e_unit)) = reply.co2e() {
            let text = |key: &str| candidate.get(key).and_then(Value::as_str).map(str::to_string);
            return ModeCalibration::Found {
                activity_id: activity_id.to_string(),
                name: text("name"),
                source: text("source"),
                region: text("region"),
                co2e_test,
                co2e_unit,
            };
        }
    }

    ModeCalibration::NotFound {
        error: "No working activity_id found".to_string(),
        candidates_tested: candidates.len(),
    }
}

/// 1 t over 100 km.
fn test_payload(activity_id: &str) -> EstimatePayload {
    EstimatePayload {
        emission_factor: EmissionFactorRef {
            activity_id: activity_id.to_string(),
            data_version: CALIBRATION_DATA_VERSION.to_string(),
        },
        parameters: WeightDistanceParameters {
            weight: 1.0,
            distance: 100.0,
            weight_unit: "t".to_string(),
            distance_unit: "km".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    /// Catalog with one broken and one working candidate per mode, except rail
    /// which has none.
    async fn mock_catalog() -> String {
        async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
            let query = params.get("query").cloned().unwrap_or_default();
            if query == "freight train" {
                return Json(json!({ "results": [] }));
            }
            let slug = query.replace(' ', "_");
            Json(json!({
                "results": [
                    { "activity_id": format!("{}-broken", slug), "name": "Broken" },
                    { "activity_id": format!("{}-ok", slug), "name": "Working", "region": "GLOBAL" }
                ]
            }))
        }

        async fn estimate(Json(payload): Json<Value>) -> (StatusCode, Json<Value>) {
            let id = payload["emission_factor"]["activity_id"].as_str().unwrap_or_default();
            if id.ends_with("-ok") {
                (StatusCode::OK, Json(json!({ "co2e": 0.1, "co2e_unit": "kg" })))
            } else {
                (StatusCode::BAD_REQUEST, Json(json!({ "message": "no such factor" })))
            }
        }

        let app = Router::new()
            .route("/data/v1/search", get(search))
            .route("/estimate", post(estimate));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_search_queries() {
        assert_eq!(search_query(TransportMode::Air), "freight flight");
        assert_eq!(search_query(TransportMode::Road), "freight vehicle");
    }

    #[tokio::test]
    async fn test_discovery_picks_first_working_candidate() {
        let url = mock_catalog().await;
        let client = EmissionsClient::new("key").with_base_url(&url);

        let report = discover_selectors(&client).await;

        assert_eq!(
            report.recommended_ids[&TransportMode::Air].as_deref(),
            Some("freight_flight-ok")
        );
        match &report.results[&TransportMode::Sea] {
            ModeCalibration::Found { region, co2e_test, .. } => {
                assert_eq!(region.as_deref(), Some("GLOBAL"));
                assert_eq!(*co2e_test, 0.1);
            }
            other => panic!("expected a selector, got {:?}", other),
        }
        assert_eq!(
            report.results[&TransportMode::Rail],
            ModeCalibration::NotFound {
                error: "No working activity_id found".into(),
                candidates_tested: 0,
            }
        );
        assert_eq!(report.recommended_ids[&TransportMode::Rail], None);
        assert!(report.selector_table().is_none());
    }

    #[test]
    fn test_complete_report_becomes_table() {
        let results = TransportMode::ALL
            .into_iter()
            .map(|mode| {
                (
                    mode,
                    ModeCalibration::Found {
                        activity_id: format!("{}-id", mode),
                        name: None,
                        source: None,
                        region: None,
                        co2e_test: 1.0,
                        co2e_unit: "kg".into(),
                    },
                )
            })
            .collect();

        let table = CalibrationReport::new(results).selector_table().unwrap();
        assert_eq!(table.get(TransportMode::Sea).activity_id, "sea-id");
        assert_eq!(table.get(TransportMode::Sea).data_version, "^6");
    }
}
