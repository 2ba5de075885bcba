//! CSV row reader

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use contracts::{ContractError, Row};
use tracing::{debug, warn};

/// Read all rows from a CSV file at `path`.
///
/// Rows come back in file order as header → value maps. Headers and values
/// are whitespace-trimmed; rows whose fields are all empty are skipped.
///
/// # Errors
/// `EmptyOrUnparseable` when the file cannot be read, has no header, or
/// yields zero usable rows.
pub fn read_rows(path: &Path) -> Result<Vec<Row>, ContractError> {
    let display = path.display().to_string();
    let file = std::fs::File::open(path)
        .map_err(|e| ContractError::empty_or_unparseable(&display, e.to_string()))?;
    read_rows_from(file, &display)
}

/// Read all rows from any reader. `origin` labels error messages.
pub fn read_rows_from(input: impl Read, origin: &str) -> Result<Vec<Row>, ContractError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| ContractError::empty_or_unparseable(origin, e.to_string()))?
        .clone();

    if headers.is_empty() {
        return Err(ContractError::empty_or_unparseable(origin, "no header row"));
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                // One bad row does not poison the file.
                warn!(origin, line = line + 2, error = %e, "skipping malformed row");
                continue;
            }
        };

        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();

        if row.is_empty() {
            continue;
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ContractError::empty_or_unparseable(
            origin,
            "no usable rows",
        ));
    }

    debug!(origin, rows = rows.len(), "ingested rows");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_basic_rows_in_order() {
        let csv = "email,name\na@example.com,Ann\nb@example.com,Bob\n";
        let rows = read_rows_from(csv.as_bytes(), "test").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["email"], "a@example.com");
        assert_eq!(rows[1]["name"], "Bob");
    }

    #[test]
    fn test_trims_whitespace() {
        let csv = "email , name\n a@example.com , Ann \n";
        let rows = read_rows_from(csv.as_bytes(), "test").unwrap();
        assert_eq!(rows[0]["email"], "a@example.com");
        assert_eq!(rows[0]["name"], "Ann");
    }

    #[test]
    fn test_empty_rows_skipped() {
        let csv = "email,name\n,,\na@example.com,Ann\n,\n";
        let rows = read_rows_from(csv.as_bytes(), "test").unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_empty_file_fails() {
        let err = read_rows_from("".as_bytes(), "test").unwrap_err();
        assert!(matches!(err, ContractError::EmptyOrUnparseable { .. }));
    }

    #[test]
    fn test_header_only_fails() {
        let err = read_rows_from("email,name\n".as_bytes(), "test").unwrap_err();
        assert!(matches!(err, ContractError::EmptyOrUnparseable { .. }));
    }

    #[test]
    fn test_missing_trailing_fields_tolerated() {
        let csv = "email,name\na@example.com\n";
        let rows = read_rows_from(csv.as_bytes(), "test").unwrap();
        assert_eq!(rows[0].get("name"), None);
        assert_eq!(rows[0]["email"], "a@example.com");
    }
}
