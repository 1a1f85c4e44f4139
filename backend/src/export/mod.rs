//! CSV export of shipments and their results.
//!
//! Records are JSON objects; their key order (insertion order) becomes the
//! column order, taken from the first record. Fields are quoted only when
//! they contain a comma, a double quote or a line break, with inner quotes
//! doubled. Numbers are written in their JSON form and `null` as an empty field.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::models::{RowResult, RowStatus, ShipmentRow};

/// One exported line.
pub type Record = Map<String, Value>;

/// Records with only the shipment columns.
pub fn shipment_records(rows: &[ShipmentRow]) -> Vec<Record> {
    rows.iter().map(shipment_record).collect()
}

fn shipment_record(row: &ShipmentRow) -> Record {
    ShipmentRow::COLUMNS
        .iter()
        .zip(row.values())
        .map(|(column, value)| (column.to_string(), Value::String(value.to_string())))
        .collect()
}

/// Shipment columns followed by `status`, `co2e_kg` and `error`.
///
/// Rows without a result (shorter `results`) are exported as `pending`.
pub fn merge_results(rows: &[ShipmentRow], results: &[RowResult]) -> Vec<Record> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let result = results.get(index).cloned().unwrap_or_default();
            let mut record = shipment_record(row);
            record.insert("status".into(), Value::String(result.status.to_string()));
            record.insert(
                "co2e_kg".into(),
                result
                    .co2e_kg
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            );
            record.insert(
                "error".into(),
                result.error.map(Value::String).unwrap_or(Value::Null),
            );
            record
        })
        .collect()
}

/// Serialize records as CSV text. Returns `None` when there is nothing to export.
pub fn export_to_csv(records: &[Record]) -> csv::Result<Option<String>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&headers)?;
    for record in records {
        writer.write_record(headers.iter().map(|h| format_value(record.get(*h))))?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    // no terminator after the last line
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(Some(text))
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// `freight-emissions-<YYYY-MM-DD>.csv`
pub fn export_filename(date: NaiveDate) -> String {
    format!("freight-emissions-{}.csv", date.format("%Y-%m-%d"))
}

/// Export filename for today's date.
pub fn export_filename_today() -> String {
    export_filename(chrono::Local::now().date_naive())
}

/// Write the CSV into `dir` under the dated export filename.
pub fn write_export(dir: &Path, csv: &str, date: NaiveDate) -> std::io::Result<PathBuf> {
    let path = dir.join(export_filename(date));
    std::fs::write(&path, csv)?;
    Ok(path)
}

/// Number of rows in each status.
pub fn status_counts(results: &[RowResult]) -> Vec<(RowStatus, usize)> {
    [
        RowStatus::Pending,
        RowStatus::Processing,
        RowStatus::Success,
        RowStatus::Error,
        RowStatus::Invalid,
    ]
    .into_iter()
    .map(|status| (status, results.iter().filter(|r| r.status == status).count()))
    .filter(|(_, n)| *n > 0)
    .collect()
}
