//! HTTP Server for the freight emissions API.
//!
//! # API Endpoints
//!
//! | Method | Path                     | Description                              |
//! |--------|--------------------------|------------------------------------------|
//! | GET    | `/health`                | Health check                             |
//! | GET    | `/api/emissions/factors` | Configured emission factor selectors     |
//! | POST   | `/api/emissions`         | Estimate one shipment                    |
//! | POST   | `/api/upload`            | Parse and validate a CSV                 |
//! | POST   | `/api/process`           | Parse, validate and estimate a CSV       |
//! | POST   | `/api/export`            | Download a CSV (add `process=true` to estimate first) |
//! | GET    | `/api/logs`              | SSE stream for real-time logs            |

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::any::Any;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{
    error_response, EmissionsApiRequest, EmissionsFailure, EmissionsSuccess, ProcessResponse,
    UploadResponse,
};
use crate::batch::{prepare, run_prepared};
use crate::config::Settings;
use crate::emissions::EmissionsClient;
use crate::error::{EmissionsError, PipelineError, ServerError};
use crate::export::{export_filename_today, export_to_csv};

type ApiError = (StatusCode, Json<Value>);

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    client: Option<EmissionsClient>,
}

impl AppState {
    /// Build the state; a missing API key leaves the client unset.
    pub fn new(settings: Settings) -> Self {
        let client = EmissionsClient::from_settings(&settings).ok();
        Self {
            settings: Arc::new(settings),
            client,
        }
    }

    fn client(&self) -> Result<&EmissionsClient, EmissionsError> {
        self.client.as_ref().ok_or(EmissionsError::MissingApiKey)
    }
}

/// Application routes with CORS and panic recovery.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/emissions", post(estimate_emissions))
        .route("/api/emissions/factors", get(emission_factors))
        .route("/api/upload", post(upload_csv))
        .route("/api/process", post(process_csv))
        .route("/api/export", post(export_csv))
        .route("/api/logs", get(sse_logs))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    if settings.api_key.is_none() {
        eprintln!("⚠️  CLIMATIQ_API_KEY not set: emissions requests will fail");
    }

    let app = router(AppState::new(settings));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Freight emissions server running on http://localhost:{}", port);
    println!("   POST /api/emissions         - Estimate one shipment");
    println!("   GET  /api/emissions/factors - Emission factor selectors");
    println!("   POST /api/upload            - Parse and validate CSV");
    println!("   POST /api/process           - Estimate a CSV batch");
    println!("   POST /api/export            - Download results as CSV");
    println!("   GET  /api/logs              - SSE log stream");
    println!("   GET  /health                - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "freight-emissions",
        "version": env!("CARGO_PKG_VERSION"),
        "api_key_configured": state.client.is_some(),
        "endpoints": {
            "emissions": "POST /api/emissions",
            "factors": "GET /api/emissions/factors",
            "upload": "POST /api/upload",
            "process": "POST /api/process",
            "export": "POST /api/export",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn emission_factors(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "selectors": state.settings.selectors,
        "base_url": state.settings.base_url,
    }))
}

/// Single-shipment estimate.
async fn estimate_emissions(
    State(state): State<AppState>,
    payload: Result<Json<EmissionsApiRequest>, JsonRejection>,
) -> Response {
    let result = async {
        // configuration errors win over anything wrong with the body
        let client = state.client()?;
        let Json(body) = payload.map_err(|rejection| {
            EmissionsError::InvalidRequest(format!("Invalid JSON body: {}", rejection.body_text()))
        })?;
        let request = body.into_request()?;
        client.estimate(&request).await
    }
    .await;

    match result {
        Ok(estimate) => Json(EmissionsSuccess::from(estimate)).into_response(),
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(EmissionsFailure::from(&e))).into_response()
        }
    }
}

/// SSE endpoint for real-time log and progress streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let json = serde_json::to_string(&event).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload CSV endpoint: parse and validate only.
async fn upload_csv(multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_form(multipart).await?;
    let prepared = prepare(&form.file).map_err(|e| api_error(ServerError::from(e)))?;
    Ok(Json(UploadResponse::from(prepared)))
}

/// Process CSV endpoint: the whole batch in one request.
async fn process_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let client = state.client().map_err(emissions_api_error)?;
    let form = read_form(multipart).await?;
    let prepared = prepare(&form.file).map_err(|e| api_error(ServerError::from(e)))?;
    let report = run_prepared(prepared, client, |_| {}).await;
    Ok(Json(ProcessResponse::from(report)))
}

/// Export CSV endpoint: the uploaded rows, or their results with `process=true`.
async fn export_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;

    let csv = if form.process {
        let client = state.client().map_err(emissions_api_error)?;
        let prepared = prepare(&form.file).map_err(|e| api_error(ServerError::from(e)))?;
        run_prepared(prepared, client, |_| {}).await.to_csv()
    } else {
        let prepared = prepare(&form.file).map_err(|e| api_error(ServerError::from(e)))?;
        export_to_csv(&prepared.records()).map_err(PipelineError::from)
    }
    .map_err(|e| api_error(ServerError::from(e)))?;

    let csv = csv.ok_or_else(|| api_error(ServerError::BadRequest("Nothing to export".into())))?;
    let disposition = format!("attachment; filename=\"{}\"", export_filename_today());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

/// Fields of an upload form.
struct UploadForm {
    file: Vec<u8>,
    process: bool,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut process = false;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, Json(error_response(&format!("Multipart error: {}", e))))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            (StatusCode::BAD_REQUEST, Json(error_response(&format!("Read error: {}", e))))
                        })?
                        .to_vec(),
                );
            }
            "process" => {
                let value = field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, Json(error_response(&format!("Read error: {}", e))))
                })?;
                process = matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes");
            }
            _ => {}
        }
    }

    let file = file_data
        .ok_or_else(|| (StatusCode::BAD_REQUEST, Json(error_response("No file provided"))))?;

    log_info(format!(
        "📄 Upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        file.len()
    ));

    Ok(UploadForm { file, process })
}

fn api_error(err: ServerError) -> ApiError {
    log_error(err.to_string());
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error_response(&err.to_string())))
}

fn emissions_api_error(err: EmissionsError) -> ApiError {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error_response(&err.to_string())))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    log_error(format!("Handler panicked: {}", detail));

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(EmissionsFailure::new("Internal server error")),
    )
        .into_response()
}
