//! Tabular dataset with named numeric columns and one time-order column.
//!
//! Rows are sorted ascending by the time column once, at construction.
//! Every row carries the same column set and a finite integer time value;
//! duplicate time keys are rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// A single observation: column name to value.
pub type Row = BTreeMap<String, f64>;

/// An ordered, validated table of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    time_column: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset from rows. Column order follows the first row's keys.
    pub fn from_rows(time_column: impl Into<String>, rows: Vec<Row>) -> Result<Self, ForecastError> {
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Self::build(time_column.into(), columns, rows)
    }

    /// Build a dataset from a header and positional records (e.g. parsed CSV).
    ///
    /// Column order follows `header`.
    pub fn from_records(
        time_column: impl Into<String>,
        header: Vec<String>,
        records: Vec<Vec<f64>>,
    ) -> Result<Self, ForecastError> {
        let unique: BTreeSet<&String> = header.iter().collect();
        if unique.len() != header.len() {
            return Err(ForecastError::invalid("duplicate column name in header"));
        }

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            if record.len() != header.len() {
                return Err(ForecastError::invalid(format!(
                    "record {i} has {} values, header has {} columns",
                    record.len(),
                    header.len()
                )));
            }
            rows.push(header.iter().cloned().zip(record).collect());
        }
        Self::build(time_column.into(), header, rows)
    }

    fn build(time_column: String, columns: Vec<String>, mut rows: Vec<Row>) -> Result<Self, ForecastError> {
        if !rows.is_empty() && !columns.iter().any(|c| *c == time_column) {
            return Err(ForecastError::invalid(format!(
                "time column '{time_column}' not present"
            )));
        }

        let expected: BTreeSet<&String> = columns.iter().collect();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != expected.len() || !row.keys().all(|k| expected.contains(k)) {
                return Err(ForecastError::invalid(format!(
                    "row {i} does not match the dataset columns"
                )));
            }
            let value = row[&time_column];
            if time_key(value).is_none() {
                return Err(ForecastError::invalid(format!(
                    "row {i}: time value {value} is not a finite integer"
                )));
            }
        }

        rows.sort_by(|a, b| a[&time_column].total_cmp(&b[&time_column]));

        if let Some(pair) = rows
            .windows(2)
            .find(|w| w[0][&time_column] == w[1][&time_column])
        {
            return Err(ForecastError::invalid(format!(
                "duplicate time key {}",
                pair[0][&time_column]
            )));
        }

        Ok(Self {
            time_column,
            columns,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Positional slice `[range.start, range.end)`, clamped to the table.
    pub fn slice(&self, range: Range<usize>) -> &[Row] {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        &self.rows[start..end]
    }

    /// Time value of the row at `index`.
    pub fn time_at(&self, index: usize) -> Option<i64> {
        self.rows
            .get(index)
            .and_then(|r| time_key(r[&self.time_column]))
    }

    pub fn times(&self) -> Vec<i64> {
        (0..self.rows.len()).filter_map(|i| self.time_at(i)).collect()
    }

    pub fn last_row(&self) -> Option<&Row> {
        self.rows.last()
    }

    pub fn last_time(&self) -> Option<i64> {
        self.rows.len().checked_sub(1).and_then(|i| self.time_at(i))
    }

    /// Row whose time value equals `time`.
    pub fn row_for_time(&self, time: i64) -> Option<&Row> {
        let key = time as f64;
        self.rows
            .binary_search_by(|r| r[&self.time_column].total_cmp(&key))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// All values of one column, in time order.
    pub fn column(&self, name: &str) -> Result<Vec<f64>, ForecastError> {
        if !self.has_column(name) {
            return Err(ForecastError::invalid(format!("unknown column '{name}'")));
        }
        Ok(self.rows.iter().map(|r| r[name]).collect())
    }

    /// Rows restricted to `columns`, in time order.
    pub fn project(&self, columns: &[String]) -> Result<Vec<Row>, ForecastError> {
        if let Some(missing) = columns.iter().find(|c| !self.has_column(c)) {
            return Err(ForecastError::invalid(format!("unknown column '{missing}'")));
        }
        Ok(self
            .rows
            .iter()
            .map(|r| columns.iter().map(|c| (c.clone(), r[c])).collect())
            .collect())
    }

    /// Seed row for predicting `year` from lagged observations.
    ///
    /// Values come from the row for `year - 1` when present, otherwise from
    /// the last known row. Each `(source, lag)` pair copies `source` into the
    /// `lag` column; the time column is set to `year`.
    pub fn lagged_seed(&self, year: i64, lags: &[(&str, &str)]) -> Result<Row, ForecastError> {
        let source = self
            .row_for_time(year - 1)
            .or_else(|| self.last_row())
            .ok_or_else(|| ForecastError::invalid("dataset is empty"))?;

        let mut seed = Row::new();
        for (from, to) in lags {
            let value = source
                .get(*from)
                .copied()
                .ok_or_else(|| ForecastError::invalid(format!("unknown column '{from}'")))?;
            seed.insert((*to).to_string(), value);
        }
        seed.insert(self.time_column.clone(), year as f64);
        Ok(seed)
    }
}

/// Integer time key for a stored value, if it is a finite whole number.
pub(crate) fn time_key(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}
