//! Recursive multi-step forecasting with two chained predictors.
//!
//! Each step predicts the exogenous feature first, writes it into the
//! current row, then predicts the target from the updated row. The target
//! is fed back through the lag column and the time column advances by one,
//! so errors compound with the horizon. No clamping happens here; see
//! [`crate::adjust`] for optional caller-side policies.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::dataset::{time_key, Dataset, Row};
use crate::error::{FailureContext, ForecastError, Stage};
use crate::predictor::Predictor;

/// Longest horizon a single forecast will run.
pub const MAX_HORIZON: usize = 10_000;

/// Output of one recursive iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub year: i64,
    /// 1-based position within the horizon.
    pub step: usize,
    pub feature_value: f64,
    pub target_value: f64,
}

/// Starting point for a forecast.
///
/// `row` describes the first period to forecast; `last_year` is the last
/// period with observed data. For a consistent seed the row's time value is
/// `last_year + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub row: Row,
    pub last_year: i64,
}

/// Supplies the seed row for [`RecursiveForecaster::predict_for_year`].
pub trait SeedSource {
    fn seed(&self) -> Result<Seed, ForecastError>;
}

impl SeedSource for Seed {
    fn seed(&self) -> Result<Seed, ForecastError> {
        Ok(self.clone())
    }
}

/// Seed built from the last observed row of a dataset.
///
/// Each `(source, lag)` pair copies the last observed `source` value into the
/// `lag` column of a row stamped with the following year.
#[derive(Debug, Clone)]
pub struct LaggedSeed<'a> {
    dataset: &'a Dataset,
    lags: Vec<(String, String)>,
}

impl<'a> LaggedSeed<'a> {
    pub fn new(dataset: &'a Dataset, lags: Vec<(String, String)>) -> Self {
        Self { dataset, lags }
    }
}

impl SeedSource for LaggedSeed<'_> {
    fn seed(&self) -> Result<Seed, ForecastError> {
        let last_year = self
            .dataset
            .last_time()
            .ok_or_else(|| ForecastError::invalid("dataset is empty"))?;
        let lags: Vec<(&str, &str)> = self
            .lags
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        let row = self.dataset.lagged_seed(last_year + 1, &lags)?;
        Ok(Seed { row, last_year })
    }
}

/// Column roles for the recursive state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecursiveForecaster {
    /// Exogenous feature predicted first and written back each step.
    pub feature_column: String,
    pub time_column: String,
    /// Receives the previous step's target prediction.
    pub target_lag_column: String,
}

impl RecursiveForecaster {
    pub fn new(
        feature_column: impl Into<String>,
        time_column: impl Into<String>,
        target_lag_column: impl Into<String>,
    ) -> Self {
        Self {
            feature_column: feature_column.into(),
            time_column: time_column.into(),
            target_lag_column: target_lag_column.into(),
        }
    }

    /// Run `horizon` chained steps starting from `seed`.
    pub fn forecast<F, T>(
        &self,
        seed: &Row,
        feature_predictor: &F,
        target_predictor: &T,
        horizon: usize,
    ) -> Result<Vec<ForecastStep>, ForecastError>
    where
        F: Predictor + ?Sized,
        T: Predictor + ?Sized,
    {
        if horizon == 0 {
            return Err(ForecastError::invalid("horizon must be at least 1"));
        }
        if horizon > MAX_HORIZON {
            return Err(ForecastError::invalid(format!(
                "horizon {horizon} exceeds the maximum of {MAX_HORIZON}"
            )));
        }
        let mut year = seed
            .get(&self.time_column)
            .copied()
            .and_then(time_key)
            .ok_or_else(|| {
                ForecastError::invalid(format!(
                    "seed row needs an integer '{}' value",
                    self.time_column
                ))
            })?;

        // The time column is advanced once more after the last step.
        if year.checked_add(horizon as i64).is_none() {
            return Err(ForecastError::invalid(format!(
                "forecasting {horizon} years from {year} overflows the time column"
            )));
        }

        let mut current = seed.clone();
        let mut steps = Vec::with_capacity(horizon);

        for step in 1..=horizon {
            let feature_value = feature_predictor.predict_row(&current).map_err(|e| {
                ForecastError::predictor(Stage::Predict, FailureContext::year(year), e)
            })?;
            current.insert(self.feature_column.clone(), feature_value);

            let target_value = target_predictor.predict_row(&current).map_err(|e| {
                ForecastError::predictor(Stage::Predict, FailureContext::year(year), e)
            })?;

            trace!(year, step, feature_value, target_value, "forecast step");
            steps.push(ForecastStep {
                year,
                step,
                feature_value,
                target_value,
            });

            current.insert(self.target_lag_column.clone(), target_value);
            year += 1;
            current.insert(self.time_column.clone(), year as f64);
        }

        Ok(steps)
    }

    /// Forecast up to `target_year` and return only that year's step.
    ///
    /// The horizon is `target_year - last_year`, which must be at least 1
    /// and at most [`MAX_HORIZON`].
    pub fn predict_for_year<S, F, T>(
        &self,
        target_year: i64,
        seeds: &S,
        feature_predictor: &F,
        target_predictor: &T,
    ) -> Result<ForecastStep, ForecastError>
    where
        S: SeedSource + ?Sized,
        F: Predictor + ?Sized,
        T: Predictor + ?Sized,
    {
        let seed = seeds.seed()?;
        if target_year <= seed.last_year {
            return Err(ForecastError::invalid(format!(
                "target year must be strictly after last known year ({target_year} <= {})",
                seed.last_year
            )));
        }
        let horizon = target_year
            .checked_sub(seed.last_year)
            .and_then(|gap| usize::try_from(gap).ok())
            .ok_or_else(|| {
                ForecastError::invalid(format!(
                    "horizon from {} to {target_year} is out of range",
                    seed.last_year
                ))
            })?;

        self.forecast(&seed.row, feature_predictor, target_predictor, horizon)?
            .into_iter()
            .find(|s| s.year == target_year)
            .ok_or(ForecastError::NotFound { year: target_year })
    }
}
