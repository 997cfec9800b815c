//! Recast Core: datasets, expanding-window splits, predictors, recursive forecasting.
//!
//! This crate contains the pure, I/O-free pieces:
//! - Dataset with a time-order column, sorted and validated on construction
//! - Expanding-window fold splitter (lazy, restartable)
//! - Predictor trait with pre-trained and trainable reference implementations
//! - Recursive forecaster chaining a feature predictor and a target predictor
//! - Optional post-processing adjustments for forecast steps
//! - Shared error taxonomy

pub mod adjust;
pub mod dataset;
pub mod error;
pub mod forecaster;
pub mod predictor;
pub mod splitter;

pub use adjust::{apply_all, Adjustment, Change, ClampNonNegative, RatioScale, TrailingMeanFallback};
pub use dataset::{Dataset, Row};
pub use error::{FailureContext, ForecastError, PredictorError, Stage};
pub use forecaster::{
    ForecastStep, LaggedSeed, RecursiveForecaster, Seed, SeedSource, MAX_HORIZON,
};
pub use predictor::{
    ColumnPredictor, ConstantPredictor, LinearPredictor, Predictor, RollingMeanPredictor,
};
pub use splitter::{split, ExpandingWindow, Fold, Folds};
