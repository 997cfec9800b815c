//! Serializable experiment configuration (TOML).
//!
//! One file describes the dataset, the validation scheme, the grid to tune
//! over, the model being tuned, and optionally the recursive forecast.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use recast_core::{
    Adjustment, ClampNonNegative, ExpandingWindow, RatioScale, RecursiveForecaster,
    TrailingMeanFallback,
};

use crate::cv::CrossValidator;
use crate::grid::ParameterGrid;
use crate::metrics::ScoreMetric;
use crate::models::ModelConfig;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_time_column() -> String {
    "Year".to_string()
}

fn one() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSection {
    /// CSV file, relative paths resolved against the config file.
    pub path: PathBuf,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    pub target_column: String,
    /// Empty means every column except the target.
    #[serde(default)]
    pub feature_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationSection {
    pub initial_train_size: usize,
    #[serde(default = "one")]
    pub horizon: usize,
    #[serde(default = "one")]
    pub step: usize,
    #[serde(default)]
    pub metric: ScoreMetric,
    #[serde(default)]
    pub parallel: bool,
}

/// Source column → lag column mapping for building seed rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagSpec {
    pub source: String,
    pub lagged: String,
}

/// Post-processing applied to forecast steps, in field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustSection {
    /// Replace non-finite or negative targets with the trailing mean of
    /// this many observed targets.
    #[serde(default)]
    pub trailing_mean_fallback: Option<usize>,
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub clamp_non_negative: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSection {
    pub feature_column: String,
    pub target_lag_column: String,
    #[serde(default)]
    pub lags: Vec<LagSpec>,
    pub feature_model: ModelConfig,
    /// Defaults to `[model]` with the best grid parameters when absent.
    #[serde(default)]
    pub target_model: Option<ModelConfig>,
    #[serde(default)]
    pub adjust: AdjustSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub dataset: DatasetSection,
    pub validation: ValidationSection,
    #[serde(default)]
    pub grid: ParameterGrid,
    pub model: ModelConfig,
    #[serde(default)]
    pub forecast: Option<ForecastSection>,
}

impl ExperimentConfig {
    /// Load from a TOML file and resolve the dataset path relative to it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if config.dataset.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.dataset.path = dir.join(&config.dataset.path);
            }
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window()?;
        self.grid
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self
            .dataset
            .feature_columns
            .contains(&self.dataset.target_column)
        {
            return Err(ConfigError::Invalid(format!(
                "target column '{}' is also listed as a feature",
                self.dataset.target_column
            )));
        }

        if let Some(forecast) = &self.forecast {
            if forecast.feature_column == forecast.target_lag_column {
                return Err(ConfigError::Invalid(
                    "feature_column and target_lag_column must differ".into(),
                ));
            }
            if let Some(ratio) = forecast.adjust.ratio {
                if !ratio.is_finite() {
                    return Err(ConfigError::Invalid("adjust.ratio must be finite".into()));
                }
            }
            if forecast.adjust.trailing_mean_fallback == Some(0) {
                return Err(ConfigError::Invalid(
                    "adjust.trailing_mean_fallback must be positive".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn window(&self) -> Result<ExpandingWindow, ConfigError> {
        let v = &self.validation;
        ExpandingWindow::new(v.initial_train_size, v.horizon, v.step)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn cross_validator(&self) -> Result<CrossValidator, ConfigError> {
        Ok(CrossValidator::new(
            self.window()?,
            self.dataset.target_column.clone(),
            self.dataset.feature_columns.clone(),
        ))
    }

    pub fn forecast_section(&self) -> Result<&ForecastSection, ConfigError> {
        self.forecast
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("missing [forecast] section".into()))
    }
}

impl ForecastSection {
    pub fn forecaster(&self, time_column: &str) -> RecursiveForecaster {
        RecursiveForecaster::new(
            self.feature_column.clone(),
            time_column,
            self.target_lag_column.clone(),
        )
    }

    pub fn lag_pairs(&self) -> Vec<(String, String)> {
        self.lags
            .iter()
            .map(|l| (l.source.clone(), l.lagged.clone()))
            .collect()
    }
}

impl AdjustSection {
    /// Build the adjustment chain against the observed target history.
    ///
    /// A fallback is skipped when the history has no values to average.
    pub fn build(&self, history: &[f64]) -> Vec<Box<dyn Adjustment + Send + Sync>> {
        let mut chain: Vec<Box<dyn Adjustment + Send + Sync>> = Vec::new();
        if let Some(window) = self.trailing_mean_fallback {
            if let Some(fallback) = TrailingMeanFallback::from_history(history, window) {
                chain.push(Box::new(fallback));
            }
        }
        if let Some(ratio) = self.ratio {
            chain.push(Box::new(RatioScale { ratio }));
        }
        if self.clamp_non_negative {
            chain.push(Box::new(ClampNonNegative));
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [dataset]
        path = "population.csv"
        target_column = "Total"
        feature_columns = ["Total_Lagged", "Population_lagged"]

        [validation]
        initial_train_size = 7
        metric = "rmse"

        [[grid]]
        name = "window"
        values = [2, 3, 4]

        [model]
        type = "rolling_mean"
        window = 3

        [forecast]
        feature_column = "Population_lagged"
        target_lag_column = "Total_Lagged"
        lags = [
            { source = "Total", lagged = "Total_Lagged" },
            { source = "Population", lagged = "Population_lagged" },
        ]

        [forecast.feature_model]
        type = "column"
        column = "Population_lagged"

        [forecast.adjust]
        trailing_mean_fallback = 3
        clamp_non_negative = true
    "#;

    #[test]
    fn parses_full_config_with_defaults() {
        let cfg = ExperimentConfig::from_toml(FULL).unwrap();
        assert_eq!(cfg.dataset.time_column, "Year");
        assert_eq!(cfg.validation.horizon, 1);
        assert_eq!(cfg.validation.step, 1);
        assert_eq!(cfg.validation.metric, ScoreMetric::Rmse);
        assert!(!cfg.validation.parallel);
        assert_eq!(cfg.grid.size(), 3);

        let forecast = cfg.forecast_section().unwrap();
        assert!(forecast.target_model.is_none());
        assert_eq!(forecast.lag_pairs().len(), 2);
        assert_eq!(forecast.adjust.build(&[1.0, 2.0, 3.0]).len(), 2);
    }

    #[test]
    fn zero_horizon_is_invalid() {
        let toml = FULL.replace("initial_train_size = 7", "initial_train_size = 7\nhorizon = 0");
        let err = ExperimentConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn empty_grid_axis_is_invalid() {
        let toml = FULL.replace("values = [2, 3, 4]", "values = []");
        assert!(matches!(
            ExperimentConfig::from_toml(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn target_in_features_is_invalid() {
        let toml = FULL.replace(
            "feature_columns = [\"Total_Lagged\", \"Population_lagged\"]",
            "feature_columns = [\"Total\"]",
        );
        assert!(ExperimentConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = ExperimentConfig::from_toml("[dataset").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_forecast_section_is_reported() {
        let toml = FULL.split("[forecast]").next().unwrap().to_string();
        let cfg = ExperimentConfig::from_toml(&toml).unwrap();
        assert!(cfg.forecast_section().is_err());
    }

    #[test]
    fn from_file_resolves_relative_dataset_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.toml");
        std::fs::write(&path, FULL).unwrap();

        let cfg = ExperimentConfig::from_file(&path).unwrap();
        assert_eq!(cfg.dataset.path, dir.path().join("population.csv"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ExperimentConfig::from_file(Path::new("/nonexistent/recast.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
