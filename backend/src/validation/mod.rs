//! Field-level validation of shipment rows.
//!
//! Every rule is independent, so one row can collect several errors. A row
//! with no errors is valid and is the only kind of row that is ever sent to
//! the emissions provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use freight_emissions::{validate_all, ShipmentRow};
//!
//! let rows = vec![ShipmentRow { mode: "truck".into(), ..Default::default() }];
//! let errors = validate_all(&rows);
//! assert!(errors.iter().any(|e| e.field == "mode"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{parse_weight, ShipmentRow, TransportMode};

/// A problem with one field of one row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    /// Row index in the parsed sequence
    pub row: usize,
    /// Offending column
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl ValidationError {
    fn new(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a single row.
pub fn validate_row(row: &ShipmentRow, index: usize) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if row.shipment_id.trim().is_empty() {
        errors.push(ValidationError::new(index, "shipment_id", "Missing shipment ID"));
    }

    if row.origin_address.trim().is_empty() {
        errors.push(ValidationError::new(index, "origin_address", "Missing origin address"));
    }

    if row.destination_address.trim().is_empty() {
        errors.push(ValidationError::new(
            index,
            "destination_address",
            "Missing destination address",
        ));
    }

    if row.mode.parse::<TransportMode>().is_err() {
        errors.push(ValidationError::new(
            index,
            "mode",
            format!("Invalid mode. Must be one of: {}", TransportMode::valid_list()),
        ));
    }

    if parse_weight(&row.weight_kg).is_none() {
        errors.push(ValidationError::new(
            index,
            "weight_kg",
            "Weight must be a positive number",
        ));
    }

    errors
}

/// Validate every row, in order. Never stops early.
pub fn validate_all(rows: &[ShipmentRow]) -> Vec<ValidationError> {
    rows.iter()
        .enumerate()
        .flat_map(|(index, row)| validate_row(row, index))
        .collect()
}

/// Indices of rows that have at least one error.
pub fn invalid_rows(errors: &[ValidationError]) -> BTreeSet<usize> {
    errors.iter().map(|e| e.row).collect()
}

/// Errors belonging to one row.
pub fn errors_for_row(errors: &[ValidationError], row: usize) -> Vec<&ValidationError> {
    errors.iter().filter(|e| e.row == row).collect()
}

/// Valid/invalid row counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationSummary {
    pub valid: usize,
    pub invalid: usize,
}

impl ValidationSummary {
    pub fn new(row_count: usize, errors: &[ValidationError]) -> Self {
        let invalid = invalid_rows(errors).len();
        Self {
            valid: row_count.saturating_sub(invalid),
            invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, origin: &str, dest: &str, mode: &str, weight: &str) -> ShipmentRow {
        ShipmentRow {
            shipment_id: id.into(),
            origin_address: origin.into(),
            destination_address: dest.into(),
            mode: mode.into(),
            weight_kg: weight.into(),
        }
    }

    fn valid() -> ShipmentRow {
        row("SHP-1", "Shanghai", "Los Angeles", "sea", "1500.5")
    }

    fn fields(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_valid_row() {
        assert!(validate_row(&valid(), 0).is_empty());
    }

    #[test]
    fn test_blank_text_fields() {
        for blank in ["", "   ", "\t"] {
            let r = row(blank, "A", "B", "air", "10");
            assert_eq!(fields(&validate_row(&r, 0)), ["shipment_id"]);

            let r = row("S", blank, "B", "air", "10");
            assert_eq!(fields(&validate_row(&r, 0)), ["origin_address"]);

            let r = row("S", "A", blank, "air", "10");
            assert_eq!(fields(&validate_row(&r, 0)), ["destination_address"]);
        }
    }

    #[test]
    fn test_mode_rules() {
        for mode in ["air", "AIR", "Road", "sEa", "rail"] {
            let r = row("S", "A", "B", mode, "10");
            assert!(validate_row(&r, 0).is_empty(), "{mode} should be valid");
        }
        for mode in ["truck", "", "airplane", " "] {
            let r = row("S", "A", "B", mode, "10");
            let errors = validate_row(&r, 0);
            assert_eq!(fields(&errors), ["mode"], "{mode:?} should be invalid");
            assert!(errors[0].message.contains("air, sea, road, rail"));
        }
    }

    #[test]
    fn test_weight_rules() {
        for weight in ["abc", "-5", "0", "", "0.0", "NaN", "inf"] {
            let r = row("S", "A", "B", "air", weight);
            assert_eq!(fields(&validate_row(&r, 0)), ["weight_kg"], "{weight:?}");
        }
        let r = row("S", "A", "B", "air", "1500.5");
        assert!(validate_row(&r, 0).is_empty());
    }

    #[test]
    fn test_errors_accumulate() {
        let r = row("", "", "", "truck", "-1");
        let errors = validate_row(&r, 3);
        assert_eq!(
            fields(&errors),
            ["shipment_id", "origin_address", "destination_address", "mode", "weight_kg"]
        );
        assert!(errors.iter().all(|e| e.row == 3));
    }

    #[test]
    fn test_row_index_stability() {
        let rows = vec![
            row("", "", "B", "air", "1"),
            valid(),
            row("S", "A", "B", "truck", "1"),
            valid(),
            row("S", "A", "B", "air", "0"),
        ];
        let errors = validate_all(&rows);

        let rows_with_errors: Vec<usize> = errors.iter().map(|e| e.row).collect();
        assert_eq!(rows_with_errors, [0, 0, 2, 4]);
        assert_eq!(invalid_rows(&errors), BTreeSet::from([0, 2, 4]));
        assert_eq!(errors_for_row(&errors, 2)[0].field, "mode");
    }

    #[test]
    fn test_validate_all_idempotent() {
        let rows = vec![row("", "A", "B", "x", "y"), valid()];
        assert_eq!(validate_all(&rows), validate_all(&rows));
    }

    #[test]
    fn test_summary() {
        let rows = vec![row("", "", "B", "air", "1"), valid(), valid()];
        let summary = ValidationSummary::new(rows.len(), &validate_all(&rows));
        assert_eq!(summary, ValidationSummary { valid: 2, invalid: 1 });
    }

    #[test]
    fn test_summary_with_errors_beyond_row_count() {
        let errors: Vec<ValidationError> = (0..3)
            .map(|row| ValidationError::new(row, "mode", "Invalid mode"))
            .collect();

        let summary = ValidationSummary::new(1, &errors);
        assert_eq!(summary, ValidationSummary { valid: 0, invalid: 3 });
    }
}
