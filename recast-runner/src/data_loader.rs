//! Dataset loading from CSV.
//!
//! The header row names the columns; every cell must parse as a number.
//! Rows are handed to `Dataset::from_records`, which sorts by the time
//! column and rejects duplicates. The loaded dataset carries a BLAKE3
//! fingerprint so reports can be traced back to their input.

use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use recast_core::{Dataset, ForecastError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}, column '{column}': cannot parse '{value}' as a number")]
    BadValue {
        line: u64,
        column: String,
        value: String,
    },

    #[error("line {line}, column '{column}': empty cell")]
    EmptyCell { line: u64, column: String },

    #[error("invalid dataset: {0}")]
    Dataset(#[from] ForecastError),
}

/// A dataset plus its content fingerprint.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub dataset: Dataset,
    /// BLAKE3 hex digest over column names and values in time order.
    pub dataset_hash: String,
}

/// Load a CSV file from disk.
pub fn load_csv(path: &Path, time_column: &str) -> Result<LoadedData, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let loaded = read_csv(file, time_column)?;
    debug!(
        path = %path.display(),
        rows = loaded.dataset.len(),
        hash = %&loaded.dataset_hash[..12],
        "dataset loaded"
    );
    Ok(loaded)
}

/// Parse CSV from any reader.
pub fn read_csv<R: Read>(reader: R, time_column: &str) -> Result<LoadedData, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let mut values = Vec::with_capacity(header.len());
        for (column, cell) in header.iter().zip(record.iter()) {
            if cell.is_empty() {
                return Err(LoadError::EmptyCell {
                    line,
                    column: column.clone(),
                });
            }
            let value = cell.parse::<f64>().map_err(|_| LoadError::BadValue {
                line,
                column: column.clone(),
                value: cell.to_string(),
            })?;
            values.push(value);
        }
        records.push(values);
    }

    let dataset = Dataset::from_records(time_column, header, records)?;
    let dataset_hash = dataset_fingerprint(&dataset);
    Ok(LoadedData {
        dataset,
        dataset_hash,
    })
}

/// Deterministic BLAKE3 digest of a dataset's contents.
pub fn dataset_fingerprint(dataset: &Dataset) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(dataset.time_column().as_bytes());
    for column in dataset.columns() {
        hasher.update(column.as_bytes());
        hasher.update(&[0]);
    }
    for row in dataset.rows() {
        for column in dataset.columns() {
            let value = row.get(column).copied().unwrap_or(f64::NAN);
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Year,Total,Population\n2019,240,4200\n2017,220,4100\n2018,230,4150\n";

    #[test]
    fn reads_and_sorts_by_time() {
        let loaded = read_csv(CSV.as_bytes(), "Year").unwrap();
        assert_eq!(loaded.dataset.times(), vec![2017, 2018, 2019]);
        assert_eq!(loaded.dataset.columns(), &["Year", "Total", "Population"]);
        assert_eq!(loaded.dataset_hash.len(), 64);
    }

    #[test]
    fn fingerprint_ignores_input_row_order() {
        let sorted = "Year,Total,Population\n2017,220,4100\n2018,230,4150\n2019,240,4200\n";
        let a = read_csv(CSV.as_bytes(), "Year").unwrap();
        let b = read_csv(sorted.as_bytes(), "Year").unwrap();
        assert_eq!(a.dataset_hash, b.dataset_hash);
    }

    #[test]
    fn fingerprint_changes_with_values() {
        let other = CSV.replace("240", "241");
        let a = read_csv(CSV.as_bytes(), "Year").unwrap();
        let b = read_csv(other.as_bytes(), "Year").unwrap();
        assert_ne!(a.dataset_hash, b.dataset_hash);
    }

    #[test]
    fn non_numeric_cell_is_bad_value() {
        let err = read_csv("Year,Total\n2019,lots\n".as_bytes(), "Year").unwrap_err();
        match err {
            LoadError::BadValue { column, value, .. } => {
                assert_eq!(column, "Total");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_cell_is_rejected() {
        let err = read_csv("Year,Total\n2019,\n".as_bytes(), "Year").unwrap_err();
        assert!(matches!(err, LoadError::EmptyCell { .. }));
    }

    #[test]
    fn duplicate_year_is_dataset_error() {
        let err = read_csv("Year,Total\n2019,1\n2019,2\n".as_bytes(), "Year").unwrap_err();
        assert!(matches!(err, LoadError::Dataset(ForecastError::InvalidArgument(_))));
    }

    #[test]
    fn missing_time_column_is_dataset_error() {
        let err = read_csv("Date,Total\n2019,1\n".as_bytes(), "Year").unwrap_err();
        assert!(matches!(err, LoadError::Dataset(_)));
    }

    #[test]
    fn ragged_row_is_csv_error() {
        let err = read_csv("Year,Total\n2019,1,7\n".as_bytes(), "Year").unwrap_err();
        assert!(matches!(err, LoadError::Csv(_)));
    }
}
