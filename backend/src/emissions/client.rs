//! HTTP client for the Climatiq estimate endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Estimate, EstimateRequest, EmissionsEstimator, SelectorTable, NOMINAL_DISTANCE_KM};
use crate::api::logs::{log_error_indent, log_info_indent, log_success_indent};
use crate::config::Settings;
use crate::error::{ConfigResult, EmissionsError, EmissionsResult};
use crate::models::{EmissionFactorSelector, TransportMode};

/// Fallback message when the provider gives no reason.
const GENERIC_FAILURE: &str = "Climatiq request failed";

/// Body of `POST /estimate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EstimatePayload {
    pub emission_factor: EmissionFactorRef,
    pub parameters: WeightDistanceParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionFactorRef {
    pub activity_id: String,
    pub data_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightDistanceParameters {
    pub weight: f64,
    pub distance: f64,
    pub weight_unit: String,
    pub distance_unit: String,
}

impl EstimatePayload {
    /// Payload for a shipment of `weight_kg` kilograms over the nominal distance.
    pub fn for_shipment(selector: &EmissionFactorSelector, weight_kg: f64) -> Self {
        Self {
            emission_factor: EmissionFactorRef {
                activity_id: selector.activity_id.clone(),
                data_version: selector.data_version.clone(),
            },
            parameters: WeightDistanceParameters {
                weight: selector.weight_unit.from_kg(weight_kg),
                distance: NOMINAL_DISTANCE_KM,
                weight_unit: selector.weight_unit.as_str().to_string(),
                distance_unit: "km".to_string(),
            },
        }
    }
}

/// What the provider said about one payload.
#[derive(Debug, Clone)]
pub(crate) struct ProviderReply {
    pub status: u16,
    pub body: Value,
}

impl ProviderReply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `(co2e, co2e_unit)` when the call succeeded with a numeric result.
    pub fn co2e(&self) -> Option<(f64, String)> {
        if !self.is_success() {
            return None;
        }
        let co2e = self.body.get("co2e")?.as_f64()?;
        let unit = self
            .body
            .get("co2e_unit")
            .and_then(Value::as_str)
            .unwrap_or("kg")
            .to_string();
        Some((co2e, unit))
    }

    /// Provider's own explanation, if any.
    pub fn message(&self) -> String {
        ["message", "error"]
            .iter()
            .filter_map(|key| self.body.get(*key))
            .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
            .unwrap_or(GENERIC_FAILURE)
            .to_string()
    }
}

/// Climatiq API client
#[derive(Debug, Clone)]
pub struct EmissionsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    selectors: SelectorTable,
}

impl EmissionsClient {
    /// Create a new client with explicit API key and the calibrated selectors
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            selectors: SelectorTable::calibrated(),
        }
    }

    /// Create a client from loaded settings.
    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        Ok(Self::new(settings.api_key()?)
            .with_base_url(&settings.base_url)
            .with_selectors(settings.selectors.clone()))
    }

    /// Create a client from the environment (`CLIMATIQ_API_KEY`, ...)
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_settings(&Settings::from_env()?)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_selectors(mut self, selectors: SelectorTable) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn selectors(&self) -> &SelectorTable {
        &self.selectors
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Estimate the emissions of one shipment.
    ///
    /// Makes exactly one provider call, or none if the request is invalid.
    pub async fn estimate(&self, request: &EstimateRequest) -> EmissionsResult<Estimate> {
        let (mode, weight_kg) = request.validate()?;
        let selector = self.selectors.get(mode);
        let payload = EstimatePayload::for_shipment(selector, weight_kg);

        log_info_indent(
            format!(
                "📡 {} {} kg ({} {}) via {}",
                mode,
                weight_kg,
                payload.parameters.weight,
                payload.parameters.weight_unit,
                selector.activity_id
            ),
            1,
        );

        let reply = self.post_estimate(&payload).await.map_err(|e| {
            log_error_indent(format!("Request failed: {}", e), 2);
            e
        })?;

        match reply.co2e() {
            Some((co2e_kg, co2e_unit)) => {
                log_success_indent(format!("{} {}", co2e_kg, co2e_unit), 2);
                Ok(Estimate {
                    co2e_kg,
                    co2e_unit,
                    mode,
                    weight_kg,
                    activity_id: selector.activity_id.clone(),
                })
            }
            None => {
                let message = reply.message();
                log_error_indent(format!("HTTP {}: {}", reply.status, message), 2);
                Err(EmissionsError::Provider {
                    status: reply.status,
                    message,
                    activity_id: selector.activity_id.clone(),
                    details: reply.body,
                })
            }
        }
    }

    /// Selector that would be used for a mode.
    pub fn selector_for(&self, mode: TransportMode) -> &EmissionFactorSelector {
        self.selectors.get(mode)
    }

    /// Send a payload to `POST /estimate`.
    pub(crate) async fn post_estimate(&self, payload: &EstimatePayload) -> EmissionsResult<ProviderReply> {
        let response = self
            .http
            .post(format!("{}/estimate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        read_reply(response).await
    }

    /// Query `GET /data/v1/search`.
    pub(crate) async fn search(&self, query: &[(&str, &str)]) -> EmissionsResult<ProviderReply> {
        let response = self
            .http
            .get(format!("{}/data/v1/search", self.base_url))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;

        read_reply(response).await
    }
}

impl EmissionsEstimator for EmissionsClient {
    fn estimate(
        &self,
        request: &EstimateRequest,
    ) -> impl std::future::Future<Output = EmissionsResult<Estimate>> + Send {
        EmissionsClient::estimate(self, request)
    }
}

/// Read status and body; a body that is not JSON is kept as a string.
async fn read_reply(response: reqwest::Response) -> EmissionsResult<ProviderReply> {
    let status = response.status().as_u16();
    let text = response.text().await?;

    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    Ok(ProviderReply { status, body })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Payloads received by a mock provider.
    pub type Received = Arc<Mutex<Vec<Value>>>;

    /// Start a mock `/estimate` that answers every call with `status`/`body`.
    pub async fn mock_provider(status: u16, body: Value) -> (String, Received) {
        let received: Received = Arc::default();
        let state = (received.clone(), status, body);

        async fn handler(
            State((received, status, body)): State<(Received, u16, Value)>,
            Json(payload): Json<Value>,
        ) -> (StatusCode, Json<Value>) {
            received.lock().unwrap().push(payload);
            (StatusCode::from_u16(status).unwrap(), Json(body))
        }

        let app = Router::new().route("/estimate", post(handler)).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), received)
    }

    #[test]
    fn test_payload_uses_tonnes_and_nominal_distance() {
        let table = SelectorTable::calibrated();
        let payload = EstimatePayload::for_shipment(table.get(TransportMode::Air), 1500.0);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["emission_factor"]["activity_id"], "freight_flight-route_type_na");
        assert_eq!(json["emission_factor"]["data_version"], "^21");
        assert_eq!(json["parameters"]["weight"], 1.5);
        assert_eq!(json["parameters"]["weight_unit"], "t");
        // origin/destination are not geocoded: distance is always 1000 km
        assert_eq!(json["parameters"]["distance"], 1000.0);
        assert_eq!(json["parameters"]["distance_unit"], "km");
    }

    #[test]
    fn test_reply_message_fallbacks() {
        let reply = |body| ProviderReply { status: 400, body };
        assert_eq!(reply(json!({"message": "bad id"})).message(), "bad id");
        assert_eq!(reply(json!({"error": "not_found"})).message(), "not_found");
        assert_eq!(reply(json!({})).message(), GENERIC_FAILURE);
        assert_eq!(reply(Value::Null).message(), GENERIC_FAILURE);
    }

    #[test]
    fn test_reply_requires_numeric_co2e() {
        let ok = ProviderReply { status: 200, body: json!({"co2e": 12.5, "co2e_unit": "kg"}) };
        assert_eq!(ok.co2e(), Some((12.5, "kg".to_string())));

        let missing = ProviderReply { status: 200, body: json!({"co2e_unit": "kg"}) };
        assert_eq!(missing.co2e(), None);

        let failed = ProviderReply { status: 500, body: json!({"co2e": 1.0}) };
        assert_eq!(failed.co2e(), None);
    }

    #[tokio::test]
    async fn test_estimate_success() {
        let (url, received) = mock_provider(200, json!({"co2e": 42.1, "co2e_unit": "kg"})).await;
        let client = EmissionsClient::new("key").with_base_url(&url);

        let estimate = client
            .estimate(&EstimateRequest::new("Rotterdam", "Antwerp", "Road", 2000.0))
            .await
            .unwrap();

        assert_eq!(estimate.co2e_kg, 42.1);
        assert_eq!(estimate.mode, TransportMode::Road);
        assert_eq!(estimate.weight_kg, 2000.0);

        let payloads = received.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["parameters"]["weight"], 2.0);
    }

    #[tokio::test]
    async fn test_estimate_provider_error_passthrough() {
        let (url, _) = mock_provider(503, json!({"message": "Service unavailable"})).await;
        let client = EmissionsClient::new("key").with_base_url(&url);

        let err = client
            .estimate(&EstimateRequest::new("A", "B", "sea", 10.0))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 503);
        assert_eq!(err.provider_status(), Some(503));
        assert_eq!(err.to_string(), "Service unavailable");
    }

    #[tokio::test]
    async fn test_estimate_missing_co2e_is_bad_gateway() {
        let (url, _) = mock_provider(200, json!({"unexpected": true})).await;
        let client = EmissionsClient::new("key").with_base_url(&url);

        let err = client
            .estimate(&EstimateRequest::new("A", "B", "rail", 10.0))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 502);
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_call() {
        let (url, received) = mock_provider(200, json!({"co2e": 1.0})).await;
        let client = EmissionsClient::new("key").with_base_url(&url);

        let err = client
            .estimate(&EstimateRequest::new("A", "B", "truck", 10.0))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = EmissionsClient::new("key").with_base_url(&url);
        let err = client
            .estimate(&EstimateRequest::new("A", "B", "air", 10.0))
            .await
            .unwrap_err();

        assert!(matches!(err, EmissionsError::Network(_)));
        assert_eq!(err.status_code(), 500);
    }
}
