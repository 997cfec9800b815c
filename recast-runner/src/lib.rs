//! Recast Runner: cross-validation, grid search, and experiment plumbing.
//!
//! This crate builds on `recast-core` to provide:
//! - Expanding-window cross-validation (sequential and rayon-parallel)
//! - Exhaustive hyperparameter grid search
//! - Score metrics (MAE, MSE, RMSE)
//! - TOML experiment configuration and model construction
//! - CSV dataset loading with BLAKE3 fingerprints
//! - JSON reports and CSV forecast export

pub mod config;
pub mod cv;
pub mod data_loader;
pub mod grid;
pub mod metrics;
pub mod models;
pub mod report;
pub mod runner;

pub use config::{
    AdjustSection, ConfigError, DatasetSection, ExperimentConfig, ForecastSection, LagSpec,
    ValidationSection,
};
pub use cv::{CrossValidator, CvOutcome, FoldOutcome};
pub use data_loader::{dataset_fingerprint, load_csv, read_csv, LoadError, LoadedData};
pub use grid::{
    GridAxis, GridSearch, ParameterCombination, ParameterGrid, ScoreRecord, ScoreStatus,
    SearchOutcome,
};
pub use metrics::{mean_absolute_error, mean_squared_error, root_mean_squared_error, ScoreMetric};
pub use models::{BoxedPredictor, ModelConfig, ModelError};
pub use report::{
    export_forecast_csv, export_json, import_json, load_report, save_report, CvReport, Report,
    ReportError, SearchReport, SCHEMA_VERSION,
};
pub use runner::{load_dataset, run_cv, run_search, ForecastPlan, RunError, YearPrediction};
