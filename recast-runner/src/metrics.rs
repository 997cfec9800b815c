//! Score metrics: pure functions over aligned true/predicted sequences.
//!
//! Lower is better for every metric here. Each function is evaluated once
//! over the full accumulated sequences, never as a running update. Empty
//! input yields NaN; the cross-validator never scores an empty sequence.

use serde::{Deserialize, Serialize};

/// Which error metric to score folds with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    #[default]
    Mae,
    Mse,
    Rmse,
}

impl ScoreMetric {
    pub fn score(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        match self {
            Self::Mae => mean_absolute_error(y_true, y_pred),
            Self::Mse => mean_squared_error(y_true, y_pred),
            Self::Rmse => root_mean_squared_error(y_true, y_pred),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mae => "MAE",
            Self::Mse => "MSE",
            Self::Rmse => "RMSE",
        }
    }

    /// Adapter for APIs taking a score closure.
    pub fn as_fn(self) -> impl Fn(&[f64], &[f64]) -> f64 + Copy + Send + Sync {
        move |t: &[f64], p: &[f64]| self.score(t, p)
    }
}

fn mean_of(y_true: &[f64], y_pred: &[f64], f: impl Fn(f64) -> f64) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return f64::NAN;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| f(t - p))
        .sum::<f64>()
        / n as f64
}

/// `mean(|true - pred|)`.
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean_of(y_true, y_pred, f64::abs)
}

/// `mean((true - pred)^2)`.
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean_of(y_true, y_pred, |e| e * e)
}

pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    mean_squared_error(y_true, y_pred).sqrt()
}
