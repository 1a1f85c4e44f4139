//! High-level pipeline: parse → validate → estimate → export.
//!
//! # Example
//!
//! ```rust,ignore
//! use freight_emissions::{process_csv, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("shipments.csv")?;
//!     let report = process_csv(&bytes, &Settings::from_env()?, |p| {
//!         eprintln!("{}%", p.percent);
//!     })
//!     .await?;
//!     println!("{}", report.to_csv()?.unwrap_or_default());
//!     Ok(())
//! }
//! ```

use serde::Serialize;

use super::processor::{BatchProcessor, BatchProgress, BatchSummary};
use crate::api::logs::{log_info, log_success, log_warning};
use crate::config::Settings;
use crate::emissions::{EmissionsClient, EmissionsEstimator};
use crate::error::PipelineResult;
use crate::export::{export_to_csv, merge_results, shipment_records, Record};
use crate::models::{RowResult, ShipmentRow};
use crate::parser::{parse_shipments, ParsedShipments, MAX_ROWS};
use crate::validation::{validate_all, ValidationError, ValidationSummary};

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub total_rows: usize,
    pub truncated: bool,
}

impl From<&ParsedShipments> for CsvInfo {
    fn from(parsed: &ParsedShipments) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.rows.len(),
            total_rows: parsed.total_rows,
            truncated: parsed.truncated(),
        }
    }
}

/// Parsed and validated upload, before any provider call.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedBatch {
    pub csv_info: CsvInfo,
    pub rows: Vec<ShipmentRow>,
    pub errors: Vec<ValidationError>,
    pub validation: ValidationSummary,
}

impl PreparedBatch {
    /// Records for exporting the rows as uploaded.
    pub fn records(&self) -> Vec<Record> {
        shipment_records(&self.rows)
    }
}

/// Result of a complete batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub csv_info: CsvInfo,
    pub rows: Vec<ShipmentRow>,
    pub errors: Vec<ValidationError>,
    pub results: Vec<RowResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    /// Rows merged with their results.
    pub fn records(&self) -> Vec<Record> {
        merge_results(&self.rows, &self.results)
    }

    /// Export CSV text, `None` when there are no rows.
    pub fn to_csv(&self) -> PipelineResult<Option<String>> {
        Ok(export_to_csv(&self.records())?)
    }
}

/// Parse and validate an upload.
pub fn prepare(bytes: &[u8]) -> PipelineResult<PreparedBatch> {
    log_info("📖 Reading CSV file...");
    let parsed = parse_shipments(bytes)?;

    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} rows", parsed.rows.len()));

    if parsed.truncated() {
        log_warning(format!(
            "File has {} rows; only the first {} will be processed ({} ignored)",
            parsed.total_rows,
            MAX_ROWS,
            parsed.dropped_rows()
        ));
    }

    let missing = parsed.missing_columns();
    if !missing.is_empty() {
        log_warning(format!("Missing columns: {}", missing.join(", ")));
    }

    log_info("✔️  Validating rows...");
    let errors = validate_all(&parsed.rows);
    let validation = ValidationSummary::new(parsed.rows.len(), &errors);

    if validation.invalid == 0 {
        log_success(format!("All {} rows valid!", validation.valid));
    } else {
        log_success(format!("Valid: {}", validation.valid));
        log_warning(format!("Invalid: {}", validation.invalid));
    }

    Ok(PreparedBatch {
        csv_info: CsvInfo::from(&parsed),
        rows: parsed.rows,
        errors,
        validation,
    })
}

/// Estimate every valid row of a prepared batch.
pub async fn run_prepared<E, F>(
    prepared: PreparedBatch,
    estimator: &E,
    on_progress: F,
) -> BatchReport
where
    E: EmissionsEstimator + Sync,
    F: FnMut(&BatchProgress) + Send,
{
    let mut processor = BatchProcessor::new(&prepared.rows, &prepared.errors);
    let batch_id = processor.batch_id().to_string();
    let summary = processor.process_all(estimator, on_progress).await;
    let results = processor.into_results();

    BatchReport {
        batch_id,
        csv_info: prepared.csv_info,
        rows: prepared.rows,
        errors: prepared.errors,
        results,
        summary,
    }
}

/// Parse, validate and estimate an upload with any estimator.
pub async fn run_batch<E, F>(bytes: &[u8], estimator: &E, on_progress: F) -> PipelineResult<BatchReport>
where
    E: EmissionsEstimator + Sync,
    F: FnMut(&BatchProgress) + Send,
{
    let prepared = prepare(bytes)?;
    Ok(run_prepared(prepared, estimator, on_progress).await)
}

/// Parse, validate and estimate an upload against the configured provider.
///
/// A missing API key fails before the file is even parsed.
pub async fn process_csv<F>(bytes: &[u8], settings: &Settings, on_progress: F) -> PipelineResult<BatchReport>
where
    F: FnMut(&BatchProgress) + Send,
{
    let client = EmissionsClient::from_settings(settings)?;
    run_batch(bytes, &client, on_progress).await
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::processor::tests::ScriptedEstimator;
    use crate::emissions::client::tests::mock_provider;
    use crate::error::{ConfigError, FormatError, PipelineError};
    use crate::models::RowStatus;
    use serde_json::json;

    const HEADER: &str = "shipment_id,origin_address,destination_address,mode,weight_kg";

    #[tokio::test]
    async fn test_three_valid_air_rows() {
        let csv = format!(
            "{HEADER}\nS1,Frankfurt,JFK,air,1000\nS2,Dubai,Nairobi,air,2000\nS3,Doha,Perth,air,500"
        );
        let (url, received) = mock_provider(200, json!({"co2e": 602.4, "co2e_unit": "kg"})).await;
        let settings = Settings::with_api_key("key").with_base_url(&url);

        let mut percents = Vec::new();
        let report = process_csv(csv.as_bytes(), &settings, |p| percents.push(p.percent))
            .await
            .unwrap();

        let payloads = received.lock().unwrap().clone();
        assert_eq!(payloads.len(), 3);
        let weights: Vec<f64> = payloads
            .iter()
            .map(|p| p["parameters"]["weight"].as_f64().unwrap())
            .collect();
        assert_eq!(weights, [1.0, 2.0, 0.5]);
        assert_eq!(percents, [33, 67, 100]);

        let csv = report.to_csv().unwrap().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        for line in &lines[1..] {
            assert!(line.ends_with(",success,602.4,"), "{line}");
        }
        assert_eq!(report.summary.succeeded, 3);
    }

    #[tokio::test]
    async fn test_invalid_mode_never_sent() {
        let csv = format!("{HEADER}\nS1,Lyon,Milan,truck,800");
        let estimator = ScriptedEstimator::default();

        let report = run_batch(csv.as_bytes(), &estimator, |_| {}).await.unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field, "mode");
        assert!(estimator.calls().is_empty());
        assert_eq!(report.results[0].status, RowStatus::Invalid);
        let exported = report.to_csv().unwrap().unwrap();
        assert!(exported.lines().nth(1).unwrap().contains(",invalid,"));
    }

    #[tokio::test]
    async fn test_provider_503_marks_row_error() {
        let csv = format!("{HEADER}\nS1,Lyon,Milan,rail,800");
        let (url, _) = mock_provider(503, json!({"error": "service_unavailable"})).await;
        let settings = Settings::with_api_key("key").with_base_url(&url);

        let mut last_percent = 0;
        let report = process_csv(csv.as_bytes(), &settings, |p| last_percent = p.percent)
            .await
            .unwrap();

        let result = &report.results[0];
        assert_eq!(result.status, RowStatus::Error);
        assert_eq!(result.error.as_deref(), Some("service_unavailable"));
        assert_eq!(last_percent, 100);
    }

    #[tokio::test]
    async fn test_header_only_fails_before_processing() {
        let estimator = ScriptedEstimator::default();
        let result = run_batch(HEADER.as_bytes(), &estimator, |_| {}).await;

        assert!(matches!(result, Err(PipelineError::Format(FormatError::EmptyFile))));
        assert!(estimator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_fatal() {
        let csv = format!("{HEADER}\nS1,Lyon,Milan,rail,800");
        let mut settings = Settings::with_api_key("unused");
        settings.api_key = None;

        let result = process_csv(csv.as_bytes(), &settings, |_| {}).await;
        assert!(matches!(result, Err(PipelineError::Config(ConfigError::MissingApiKey))));
    }

    #[test]
    fn test_prepare_truncates_large_files() {
        let mut csv = HEADER.to_string();
        for i in 0..150 {
            csv.push_str(&format!("\nS{i},A,B,road,10"));
        }

        let prepared = prepare(csv.as_bytes()).unwrap();

        assert_eq!(prepared.rows.len(), 100);
        assert_eq!(prepared.csv_info.total_rows, 150);
        assert!(prepared.csv_info.truncated);
        assert_eq!(prepared.validation.valid, 100);
    }

    #[test]
    fn test_prepared_records_export_raw_rows() {
        let csv = format!("{HEADER}\nS1,\"Lyon, FR\",Milan,rail,800");
        let prepared = prepare(csv.as_bytes()).unwrap();

        let exported = export_to_csv(&prepared.records()).unwrap().unwrap();
        assert_eq!(exported.lines().nth(1), Some("S1,\"Lyon, FR\",Milan,rail,800"));
    }
}
