//! Error taxonomy shared by the splitter, cross-validation, grid search and
//! the recursive forecaster.
//!
//! - `InvalidArgument`: malformed parameters, surfaced immediately.
//! - `InsufficientData`: a well-formed request that yields nothing to score.
//! - `PredictorFailure`: the caller-supplied model failed during fit or predict.
//! - `NotFound`: a requested year is missing from a generated forecast.

use std::fmt;

use thiserror::Error;

/// Failure reported by a [`Predictor`](crate::predictor::Predictor) implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    #[error("missing column '{0}' in input row")]
    MissingColumn(String),
    #[error("predictor used before fit")]
    NotFitted,
    #[error("expected {expected} predictions, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("{0}")]
    Model(String),
}

impl PredictorError {
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }
}

/// Which predictor operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    Fit,
    Predict,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Fit => write!(f, "fit"),
            Self::Predict => write!(f, "predict"),
        }
    }
}

/// Where a predictor failure happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureContext {
    pub fold: Option<usize>,
    pub combination: Option<String>,
    pub year: Option<i64>,
}

impl FailureContext {
    pub fn fold(index: usize) -> Self {
        Self {
            fold: Some(index),
            ..Self::default()
        }
    }

    pub fn year(year: i64) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }
}

impl fmt::Display for FailureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(fold) = self.fold {
            parts.push(format!("fold {fold}"));
        }
        if let Some(combination) = &self.combination {
            parts.push(format!("params {{{combination}}}"));
        }
        if let Some(year) = self.year {
            parts.push(format!("year {year}"));
        }
        if parts.is_empty() {
            write!(f, "no context")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Errors from splitting, validation, tuning and forecasting.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient data: {rows} rows, at least {required} needed for one fold")]
    InsufficientData { rows: usize, required: usize },

    #[error("predictor {stage} failed ({context}): {source}")]
    PredictorFailure {
        stage: Stage,
        context: FailureContext,
        #[source]
        source: PredictorError,
    },

    #[error("no forecast step for year {year}")]
    NotFound { year: i64 },
}

impl ForecastError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn predictor(stage: Stage, context: FailureContext, source: PredictorError) -> Self {
        Self::PredictorFailure {
            stage,
            context,
            source,
        }
    }

    /// Attach a parameter combination label to a predictor failure.
    ///
    /// Other variants are returned unchanged.
    pub fn with_combination(self, label: impl Into<String>) -> Self {
        match self {
            Self::PredictorFailure {
                stage,
                mut context,
                source,
            } => {
                context.combination = Some(label.into());
                Self::PredictorFailure {
                    stage,
                    context,
                    source,
                }
            }
            other => other,
        }
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}
