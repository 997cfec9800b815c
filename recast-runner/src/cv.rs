//! Expanding-window cross-validation.
//!
//! Splits the dataset into expanding train windows with fixed-size test
//! windows, fits the predictor on each train window, predicts the test
//! window, and scores all out-of-sample predictions at once.
//!
//! Failure policy:
//! - zero folds → `InsufficientData`
//! - any fit/predict failure → `PredictorFailure` with the fold index; no
//!   partial score is produced

use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use recast_core::{
    Dataset, ExpandingWindow, FailureContext, Fold, ForecastError, Predictor, PredictorError,
    Row, Stage,
};

use crate::metrics::mean_absolute_error;

// ─── Result types ────────────────────────────────────────────────────

/// Out-of-sample result of a single fold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldOutcome {
    pub fold_index: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
    /// MAE over this fold's test window only.
    pub fold_mae: f64,
}

/// Complete result of a cross-validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvOutcome {
    /// Score over all accumulated predictions.
    pub score: f64,
    pub folds: Vec<FoldOutcome>,
    /// True targets in fold order.
    pub y_true: Vec<f64>,
    /// Predictions in fold order, parallel to `y_true`.
    pub y_pred: Vec<f64>,
}

impl CvOutcome {
    pub fn fold_count(&self) -> usize {
        self.folds.len()
    }
}

// ─── Validator ───────────────────────────────────────────────────────

/// Cross-validation settings: splitter plus column roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidator {
    pub window: ExpandingWindow,
    pub target_column: String,
    /// Feature columns; empty means every column except the target.
    pub feature_columns: Vec<String>,
}

/// Projected features, targets and folds for one dataset.
struct Prepared {
    features: Vec<Row>,
    targets: Vec<f64>,
    folds: Vec<Fold>,
}

impl CrossValidator {
    pub fn new(
        window: ExpandingWindow,
        target_column: impl Into<String>,
        feature_columns: Vec<String>,
    ) -> Self {
        Self {
            window,
            target_column: target_column.into(),
            feature_columns,
        }
    }

    /// Feature columns used on `dataset`, after applying the empty-list default.
    pub fn resolve_features(&self, dataset: &Dataset) -> Result<Vec<String>, ForecastError> {
        if self.feature_columns.iter().any(|c| *c == self.target_column) {
            return Err(ForecastError::invalid(format!(
                "target column '{}' cannot also be a feature",
                self.target_column
            )));
        }
        if !self.feature_columns.is_empty() {
            return Ok(self.feature_columns.clone());
        }
        let features: Vec<String> = dataset
            .columns()
            .iter()
            .filter(|c| **c != self.target_column)
            .cloned()
            .collect();
        if features.is_empty() {
            return Err(ForecastError::invalid("no feature columns besides the target"));
        }
        Ok(features)
    }

    fn prepare(&self, dataset: &Dataset) -> Result<Prepared, ForecastError> {
        if dataset.is_empty() {
            return Err(ForecastError::invalid("dataset is empty"));
        }
        let targets = dataset.column(&self.target_column)?;
        let features = dataset.project(&self.resolve_features(dataset)?)?;
        let folds: Vec<Fold> = self.window.split(dataset.len())?.collect();

        if folds.is_empty() {
            return Err(ForecastError::InsufficientData {
                rows: dataset.len(),
                required: self.window.min_rows(),
            });
        }

        Ok(Prepared {
            features,
            targets,
            folds,
        })
    }

    /// Number of folds this validator produces on `dataset`.
    pub fn fold_count(&self, dataset: &Dataset) -> usize {
        self.window.fold_count(dataset.len())
    }

    /// Run with the default metric (mean absolute error).
    pub fn run<P>(&self, predictor: &mut P, dataset: &Dataset) -> Result<CvOutcome, ForecastError>
    where
        P: Predictor + ?Sized,
    {
        self.run_with(predictor, dataset, mean_absolute_error)
    }

    /// Sequential run: one predictor instance, refit on every fold.
    pub fn run_with<P, S>(
        &self,
        predictor: &mut P,
        dataset: &Dataset,
        score_fn: S,
    ) -> Result<CvOutcome, ForecastError>
    where
        P: Predictor + ?Sized,
        S: Fn(&[f64], &[f64]) -> f64,
    {
        let prepared = self.prepare(dataset)?;
        let mut predictions = Vec::with_capacity(prepared.folds.len());
        for fold in &prepared.folds {
            predictions.push(evaluate_fold(predictor, fold, &prepared)?);
        }
        Ok(aggregate(&prepared, predictions, score_fn))
    }

    /// Parallel run: each fold gets a fresh predictor from `factory`.
    ///
    /// Aggregation keeps fold order regardless of completion order, and the
    /// error reported is the one from the lowest failing fold.
    pub fn run_parallel<F, P, S>(
        &self,
        factory: F,
        dataset: &Dataset,
        score_fn: S,
    ) -> Result<CvOutcome, ForecastError>
    where
        F: Fn() -> Result<P, PredictorError> + Sync,
        P: Predictor,
        S: Fn(&[f64], &[f64]) -> f64,
    {
        let prepared = self.prepare(dataset)?;
        let results: Vec<Result<Vec<f64>, ForecastError>> = prepared
            .folds
            .par_iter()
            .map(|fold| {
                let mut predictor = factory().map_err(|e| {
                    ForecastError::predictor(Stage::Build, FailureContext::fold(fold.index), e)
                })?;
                evaluate_fold(&mut predictor, fold, &prepared)
            })
            .collect();

        let predictions = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(aggregate(&prepared, predictions, score_fn))
    }
}

fn evaluate_fold<P>(predictor: &mut P, fold: &Fold, data: &Prepared) -> Result<Vec<f64>, ForecastError>
where
    P: Predictor + ?Sized,
{
    let context = || FailureContext::fold(fold.index);

    predictor
        .fit(&data.features[fold.train.clone()], &data.targets[fold.train.clone()])
        .map_err(|e| ForecastError::predictor(Stage::Fit, context(), e))?;

    let predictions = predictor
        .predict(&data.features[fold.test.clone()])
        .map_err(|e| ForecastError::predictor(Stage::Predict, context(), e))?;

    if predictions.len() != fold.test.len() {
        return Err(ForecastError::predictor(
            Stage::Predict,
            context(),
            PredictorError::LengthMismatch {
                expected: fold.test.len(),
                actual: predictions.len(),
            },
        ));
    }

    debug!(
        fold = fold.index,
        train_rows = fold.train.len(),
        test_start = fold.test.start,
        predictor = predictor.name(),
        "fold evaluated"
    );
    Ok(predictions)
}

fn aggregate<S>(data: &Prepared, predictions: Vec<Vec<f64>>, score_fn: S) -> CvOutcome
where
    S: Fn(&[f64], &[f64]) -> f64,
{
    let mut y_true = Vec::new();
    let mut y_pred = Vec::new();
    let mut folds = Vec::with_capacity(data.folds.len());

    for (fold, preds) in data.folds.iter().zip(predictions) {
        let truth = &data.targets[fold.test.clone()];
        folds.push(FoldOutcome {
            fold_index: fold.index,
            train: fold.train.clone(),
            test: fold.test.clone(),
            fold_mae: mean_absolute_error(truth, &preds),
        });
        y_true.extend_from_slice(truth);
        y_pred.extend(preds);
    }

    let score = score_fn(&y_true, &y_pred);
    debug!(folds = folds.len(), predictions = y_pred.len(), score, "cross-validation complete");

    CvOutcome {
        score,
        folds,
        y_true,
        y_pred,
    }
}
