//! Experiment orchestration: config → data → CV / grid search / forecast.
//!
//! Each entry point takes an already-loaded dataset so callers can load once
//! and run several stages against the same fingerprinted input.

use thiserror::Error;
use tracing::info;

use recast_core::{
    apply_all, Adjustment, Change, Dataset, FailureContext, ForecastError, ForecastStep, LaggedSeed,
    Predictor, RecursiveForecaster, Row, SeedSource, Stage,
};

use crate::config::{ConfigError, ExperimentConfig};
use crate::data_loader::{load_csv, LoadError, LoadedData};
use crate::grid::{GridSearch, ParameterCombination};
use crate::models::{BoxedPredictor, ModelError};
use crate::report::{CvReport, ReportError, SearchReport};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

/// Load the dataset named by the config.
pub fn load_dataset(config: &ExperimentConfig) -> Result<LoadedData, RunError> {
    Ok(load_csv(&config.dataset.path, &config.dataset.time_column)?)
}

/// Cross-validate `[model]` with its configured values.
pub fn run_cv(config: &ExperimentConfig, data: &LoadedData) -> Result<CvReport, RunError> {
    let cv = config.cross_validator()?;
    let metric = config.validation.metric;

    let outcome = if config.validation.parallel {
        let model = &config.model;
        cv.run_parallel(
            || model.build().map_err(Into::into),
            &data.dataset,
            metric.as_fn(),
        )?
    } else {
        let mut predictor = config.model.build()?;
        cv.run_with(&mut predictor, &data.dataset, metric.as_fn())?
    };

    info!(
        model = config.model.kind(),
        folds = outcome.fold_count(),
        metric = metric.label(),
        score = outcome.score,
        "cross-validation finished"
    );
    Ok(CvReport::new(config, &data.dataset_hash, outcome))
}

/// Grid search `[[grid]]` over `[model]`.
pub fn run_search(config: &ExperimentConfig, data: &LoadedData) -> Result<SearchReport, RunError> {
    let search = GridSearch::new(config.cross_validator()?, config.grid.clone())
        .parallel(config.validation.parallel);
    let model = &config.model;

    let outcome = search.search(
        |params| model.build_with(params),
        &data.dataset,
        config.validation.metric.as_fn(),
    )?;

    info!(
        combinations = outcome.results.len(),
        best = %outcome.best,
        best_score = outcome.best_score,
        "grid search finished"
    );
    Ok(SearchReport::new(config, &data.dataset_hash, outcome))
}

/// Fitted models plus adjustments for a recursive forecast.
pub struct ForecastPlan {
    pub forecaster: RecursiveForecaster,
    pub lags: Vec<(String, String)>,
    pub feature_model: BoxedPredictor,
    pub target_model: BoxedPredictor,
    pub adjustments: Vec<Box<dyn Adjustment + Send + Sync>>,
}

impl ForecastPlan {
    /// Build and fit both models on the full history.
    ///
    /// The target model is `[forecast.target_model]` when given, otherwise
    /// `[model]` with `params` applied. The feature model is fit against the
    /// source column whose lag is the forecast feature column, when one is
    /// configured; pre-trained models ignore the fit.
    pub fn build(
        config: &ExperimentConfig,
        dataset: &Dataset,
        params: &ParameterCombination,
    ) -> Result<Self, RunError> {
        let section = config.forecast_section()?;

        let mut target_model = match &section.target_model {
            Some(model) => model.build()?,
            None => config.model.with_params(params)?.build()?,
        };
        let cv = config.cross_validator()?;
        let features = dataset.project(&cv.resolve_features(dataset)?)?;
        let targets = dataset.column(&config.dataset.target_column)?;
        fit(&mut target_model, &features, &targets)?;

        let mut feature_model = section.feature_model.build()?;
        if let Some(lag) = section
            .lags
            .iter()
            .find(|l| l.lagged == section.feature_column)
        {
            let feature_targets = dataset.column(&lag.source)?;
            let inputs = dataset.project(&seed_columns(
                dataset,
                &config.dataset.time_column,
                &section.lag_pairs(),
            ))?;
            fit(&mut feature_model, &inputs, &feature_targets)?;
        }

        let history = dataset.column(&config.dataset.target_column)?;
        Ok(Self {
            forecaster: section.forecaster(&config.dataset.time_column),
            lags: section.lag_pairs(),
            feature_model,
            target_model,
            adjustments: section.adjust.build(&history),
        })
    }

    fn seeds<'a>(&self, dataset: &'a Dataset) -> LaggedSeed<'a> {
        LaggedSeed::new(dataset, self.lags.clone())
    }

    /// Every step from the year after the last observation through `horizon`.
    pub fn forecast(&self, dataset: &Dataset, horizon: usize) -> Result<Vec<ForecastStep>, RunError> {
        let seed = self.seeds(dataset).seed()?;
        let mut steps = self.forecaster.forecast(
            &seed.row,
            &self.feature_model,
            &self.target_model,
            horizon,
        )?;
        apply_all(&self.adjustments, &mut steps);
        Ok(steps)
    }

    /// The single step for `year`, plus the change from the last observed target.
    pub fn predict_year(
        &self,
        dataset: &Dataset,
        target_column: &str,
        year: i64,
    ) -> Result<YearPrediction, RunError> {
        let mut step = self.forecaster.predict_for_year(
            year,
            &self.seeds(dataset),
            &self.feature_model,
            &self.target_model,
        )?;
        apply_all(&self.adjustments, std::slice::from_mut(&mut step));

        let history = dataset.column(target_column)?;
        let last_known_year = dataset
            .last_time()
            .ok_or_else(|| ForecastError::invalid("dataset is empty"))?;
        let last_known_value = history
            .last()
            .copied()
            .ok_or_else(|| ForecastError::invalid("dataset is empty"))?;

        Ok(YearPrediction {
            step,
            last_known_year,
            last_known_value,
            change: Change::between(last_known_value, step.target_value),
        })
    }
}

/// Columns a seed row carries that the dataset also has: the time column and
/// every lagged column. Lag sources are never included.
fn seed_columns(dataset: &Dataset, time_column: &str, lags: &[(String, String)]) -> Vec<String> {
    let mut columns = vec![time_column.to_string()];
    for (_, lagged) in lags {
        if dataset.has_column(lagged)
            && !columns.contains(lagged)
            && !lags.iter().any(|(s, _)| s == lagged)
        {
            columns.push(lagged.clone());
        }
    }
    columns
}

fn fit(model: &mut BoxedPredictor, rows: &[Row], targets: &[f64]) -> Result<(), RunError> {
    model
        .fit(rows, targets)
        .map_err(|e| ForecastError::predictor(Stage::Fit, FailureContext::default(), e).into())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearPrediction {
    pub step: ForecastStep,
    pub last_known_year: i64,
    pub last_known_value: f64,
    pub change: Change,
}
