//! Predictor contract and reference predictors.
//!
//! A predictor maps feature rows to one numeric prediction per row. `fit` is
//! optional: pre-trained and stateless predictors keep the default no-op,
//! trainable predictors override it and overwrite their state on every call.
//! Cross-validation and forecasting only ever see this trait.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::Row;
use crate::error::PredictorError;

/// A model capability: optional fit, required predict.
pub trait Predictor {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Train on `rows` with one target per row. Default: no-op.
    fn fit(&mut self, rows: &[Row], targets: &[f64]) -> Result<(), PredictorError> {
        let _ = (rows, targets);
        Ok(())
    }

    /// One prediction per input row, in input order.
    fn predict(&self, rows: &[Row]) -> Result<Vec<f64>, PredictorError>;

    /// Predict a single row.
    fn predict_row(&self, row: &Row) -> Result<f64, PredictorError> {
        let out = self.predict(std::slice::from_ref(row))?;
        match out.as_slice() {
            [value] => Ok(*value),
            _ => Err(PredictorError::LengthMismatch {
                expected: 1,
                actual: out.len(),
            }),
        }
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fit(&mut self, rows: &[Row], targets: &[f64]) -> Result<(), PredictorError> {
        (**self).fit(rows, targets)
    }

    fn predict(&self, rows: &[Row]) -> Result<Vec<f64>, PredictorError> {
        (**self).predict(rows)
    }
}

fn read(row: &Row, column: &str) -> Result<f64, PredictorError> {
    row.get(column)
        .copied()
        .ok_or_else(|| PredictorError::MissingColumn(column.to_string()))
}

/// Always predicts the same value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantPredictor {
    pub value: f64,
}

impl ConstantPredictor {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Predictor for ConstantPredictor {
    fn name(&self) -> &str {
        "constant"
    }

    fn predict(&self, rows: &[Row]) -> Result<Vec<f64>, PredictorError> {
        Ok(vec![self.value; rows.len()])
    }
}

/// Echoes one input column (naive persistence on a lagged feature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPredictor {
    pub column: String,
}

impl ColumnPredictor {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Predictor for ColumnPredictor {
    fn name(&self) -> &str {
        "column"
    }

    fn predict(&self, rows: &[Row]) -> Result<Vec<f64>, PredictorError> {
        rows.iter().map(|r| read(r, &self.column)).collect()
    }
}

/// Pre-trained linear model: `intercept + Σ coefficient[c] * row[c]`.
///
/// Columns not named in `coefficients` are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPredictor {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
}

impl LinearPredictor {
    pub fn new(intercept: f64, coefficients: BTreeMap<String, f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }
}

impl Predictor for LinearPredictor {
    fn name(&self) -> &str {
        "linear"
    }

    fn predict(&self, rows: &[Row]) -> Result<Vec<f64>, PredictorError> {
        rows.iter()
            .map(|row| {
                self.coefficients
                    .iter()
                    .try_fold(self.intercept, |acc, (column, coef)| {
                        Ok::<f64, PredictorError>(acc + coef * read(row, column)?)
                    })
            })
            .collect()
    }
}

/// Trainable baseline: predicts the mean of the last `window` training targets.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingMeanPredictor {
    window: usize,
    level: Option<f64>,
}

impl RollingMeanPredictor {
    pub fn new(window: usize) -> Result<Self, PredictorError> {
        if window == 0 {
            return Err(PredictorError::model("rolling mean window must be positive"));
        }
        Ok(Self {
            window,
            level: None,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Predictor for RollingMeanPredictor {
    fn name(&self) -> &str {
        "rolling_mean"
    }

    fn fit(&mut self, rows: &[Row], targets: &[f64]) -> Result<(), PredictorError> {
        if rows.len() != targets.len() {
            return Err(PredictorError::LengthMismatch {
                expected: rows.len(),
                actual: targets.len(),
            });
        }
        if targets.is_empty() {
            return Err(PredictorError::model("cannot fit on zero rows"));
        }
        let tail = &targets[targets.len().saturating_sub(self.window)..];
        self.level = Some(tail.iter().sum::<f64>() / tail.len() as f64);
        Ok(())
    }

    fn predict(&self, rows: &[Row]) -> Result<Vec<f64>, PredictorError> {
        let level = self.level.ok_or(PredictorError::NotFitted)?;
        Ok(vec![level; rows.len()])
    }
}
