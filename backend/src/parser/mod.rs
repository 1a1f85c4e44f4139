//! Shipment CSV parser with encoding and delimiter auto-detection.
//!
//! Turns an uploaded manifest into an ordered list of [`ShipmentRow`]s.
//! The position of a row in [`ParsedShipments::rows`] is its row index for
//! the rest of the pipeline (validation errors, results, export).

use std::path::Path;

use crate::error::{FormatError, FormatResult};
use crate::models::ShipmentRow;

/// Maximum number of data rows kept for processing.
pub const MAX_ROWS: usize = 100;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParsedShipments {
    /// First [`MAX_ROWS`] rows, in file order
    pub rows: Vec<ShipmentRow>,
    /// Number of non-empty data rows in the file, before truncation
    pub total_rows: usize,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Column headers as found in the file
    pub headers: Vec<String>,
}

impl ParsedShipments {
    /// Whether rows past [`MAX_ROWS`] were dropped.
    pub fn truncated(&self) -> bool {
        self.total_rows > self.rows.len()
    }

    /// Number of dropped rows.
    pub fn dropped_rows(&self) -> usize {
        self.total_rows.saturating_sub(self.rows.len())
    }

    /// Shipment columns that the header does not provide.
    pub fn missing_columns(&self) -> Vec<&'static str> {
        let normalized: Vec<String> = self.headers.iter().map(|h| normalize_header(h)).collect();
        ShipmentRow::COLUMNS
            .iter()
            .copied()
            .filter(|col| !normalized.iter().any(|h| h == col))
            .collect()
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// A UTF-8 byte order mark is dropped. Bytes that turn out not to be valid
/// UTF-8 despite detection are read as Windows-1252.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse a shipment CSV file with auto-detection of encoding and delimiter.
pub fn parse_shipments_file<P: AsRef<Path>>(path: P) -> FormatResult<ParsedShipments> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_shipments(&bytes)
}

/// Parse shipment CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_shipments(bytes: &[u8]) -> FormatResult<ParsedShipments> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    parse_shipments_str(&content, delimiter, encoding)
}

/// Parse shipment CSV text with an explicit delimiter.
pub fn parse_shipments_str(
    content: &str,
    delimiter: char,
    encoding: String,
) -> FormatResult<ParsedShipments> {
    if content.trim().is_empty() {
        return Err(FormatError::NoHeaders);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(FormatError::NoHeaders);
    }

    let columns = ColumnMap::new(&headers);
    let mut rows = Vec::new();
    let mut total_rows = 0;

    for record in reader.records() {
        let record = record.map_err(malformed)?;

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        total_rows += 1;
        if rows.len() < MAX_ROWS {
            rows.push(columns.row(&record));
        }
    }

    if rows.is_empty() {
        return Err(FormatError::EmptyFile);
    }

    Ok(ParsedShipments {
        rows,
        total_rows,
        encoding,
        delimiter,
        headers,
    })
}

fn malformed(err: csv::Error) -> FormatError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    FormatError::Malformed {
        line,
        message: err.to_string(),
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().trim_matches('"').to_lowercase()
}

/// Positions of the shipment columns within a header row.
struct ColumnMap {
    positions: [Option<usize>; 5],
}

impl ColumnMap {
    fn new(headers: &[String]) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let positions = ShipmentRow::COLUMNS.map(|col| normalized.iter().position(|h| h == col));
        Self { positions }
    }

    fn field(&self, record: &csv::StringRecord, column: usize) -> String {
        self.positions[column]
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .to_string()
    }

    fn row(&self, record: &csv::StringRecord) -> ShipmentRow {
        ShipmentRow {
            shipment_id: self.field(record, 0),
            origin_address: self.field(record, 1),
            destination_address: self.field(record, 2),
            mode: self.field(record, 3),
            weight_kg: self.field(record, 4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "shipment_id,origin_address,destination_address,mode,weight_kg";

    fn manifest(rows: usize) -> String {
        let mut csv = String::from(HEADER);
        for i in 0..rows {
            csv.push_str(&format!("\nSHP-{i:03},Hamburg,Rotterdam,sea,{}", 100 + i));
        }
        csv
    }

    #[test]
    fn test_simple_manifest() {
        let parsed = parse_shipments(manifest(2).as_bytes()).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.total_rows, 2);
        assert_eq!(parsed.delimiter, ',');
        assert_eq!(parsed.rows[0].shipment_id, "SHP-000");
        assert_eq!(parsed.rows[1].weight_kg, "101");
        assert!(!parsed.truncated());
    }

    #[test]
    fn test_quoted_fields_with_commas_and_newlines() {
        let csv = format!(
            "{HEADER}\nS1,\"12 Main St, Springfield\",\"Dock 4\nPort of Oakland\",Road,1200"
        );
        let parsed = parse_shipments(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows[0].origin_address, "12 Main St, Springfield");
        assert_eq!(parsed.rows[0].destination_address, "Dock 4\nPort of Oakland");
        assert_eq!(parsed.rows[0].mode, "Road");
    }

    #[test]
    fn test_semicolon_delimiter() {
        let csv = "shipment_id;origin_address;destination_address;mode;weight_kg\nS1;Lyon;Paris;rail;500";
        let parsed = parse_shipments(csv.as_bytes()).unwrap();

        assert_eq!(parsed.delimiter, ';');
        assert_eq!(parsed.rows[0].destination_address, "Paris");
    }

    #[test]
    fn test_header_matching_ignores_case_and_order() {
        let csv = "Weight_KG,MODE,Shipment_ID,Destination_Address,Origin_Address\n42,air,S9,B,A";
        let parsed = parse_shipments(csv.as_bytes()).unwrap();

        let row = &parsed.rows[0];
        assert_eq!(row.shipment_id, "S9");
        assert_eq!(row.origin_address, "A");
        assert_eq!(row.destination_address, "B");
        assert_eq!(row.weight_kg, "42");
    }

    #[test]
    fn test_missing_column_yields_empty_field() {
        let csv = "shipment_id,origin_address,mode\nS1,Oslo,sea";
        let parsed = parse_shipments(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows[0].destination_address, "");
        assert_eq!(parsed.rows[0].weight_kg, "");
        assert_eq!(
            parsed.missing_columns(),
            vec!["destination_address", "weight_kg"]
        );
    }

    #[test]
    fn test_empty_rows_skipped() {
        let csv = format!("{HEADER}\nS1,A,B,air,10\n\n,,,,\nS2,A,B,air,20\n");
        let parsed = parse_shipments(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].shipment_id, "S2");
    }

    #[test]
    fn test_header_only_is_format_error() {
        let result = parse_shipments(HEADER.as_bytes());
        assert!(matches!(result, Err(FormatError::EmptyFile)));
    }

    #[test]
    fn test_empty_input_is_format_error() {
        assert!(matches!(parse_shipments(b""), Err(FormatError::NoHeaders)));
        assert!(matches!(parse_shipments(b"  \n\n"), Err(FormatError::NoHeaders)));
    }

    #[test]
    fn test_truncates_to_max_rows() {
        let parsed = parse_shipments(manifest(150).as_bytes()).unwrap();

        assert_eq!(parsed.rows.len(), MAX_ROWS);
        assert_eq!(parsed.total_rows, 150);
        assert!(parsed.truncated());
        assert_eq!(parsed.dropped_rows(), 50);
        assert_eq!(parsed.rows[99].shipment_id, "SHP-099");
    }

    #[test]
    fn test_dropped_rows_never_underflows() {
        let mut parsed = parse_shipments(manifest(3).as_bytes()).unwrap();
        parsed.total_rows = 1;

        assert_eq!(parsed.dropped_rows(), 0);
        assert!(!parsed.truncated());
    }

    #[test]
    fn test_order_preserved() {
        let parsed = parse_shipments(manifest(5).as_bytes()).unwrap();
        let ids: Vec<_> = parsed.rows.iter().map(|r| r.shipment_id.as_str()).collect();
        assert_eq!(ids, ["SHP-000", "SHP-001", "SHP-002", "SHP-003", "SHP-004"]);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(manifest(1).as_bytes());
        let parsed = parse_shipments(&bytes).unwrap();

        assert_eq!(parsed.headers[0], "shipment_id");
        assert_eq!(parsed.rows[0].shipment_id, "SHP-000");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Göteborg" in ISO-8859-1
        let bytes: &[u8] = &[0x47, 0xF6, 0x74, 0x65, 0x62, 0x6F, 0x72, 0x67];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Göteborg");
    }

    #[test]
    fn test_misdetected_utf8_falls_back_to_cp1252() {
        // "Málaga" in Windows-1252
        let bytes: &[u8] = &[0x4D, 0xE1, 0x6C, 0x61, 0x67, 0x61];
        assert_eq!(decode_content(bytes, "utf-8"), "Málaga");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.csv");
        std::fs::write(&path, manifest(3)).unwrap();

        let parsed = parse_shipments_file(&path).unwrap();
        assert_eq!(parsed.rows.len(), 3);
    }
}
