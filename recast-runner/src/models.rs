//! Serializable model configuration and predictor construction.
//!
//! A `ModelConfig` names one of the built-in predictors plus its numeric
//! fields. Grid parameters override those fields by name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use recast_core::{
    ColumnPredictor, ConstantPredictor, LinearPredictor, Predictor, PredictorError,
    RollingMeanPredictor,
};

use crate::grid::ParameterCombination;

/// Predictor usable from worker threads.
pub type BoxedPredictor = Box<dyn Predictor + Send + Sync>;

/// Errors from applying parameters to a model configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("unknown parameter '{param}' for model '{model}'")]
    UnknownParameter { model: &'static str, param: String },

    #[error("parameter '{param}' must be a positive integer, got {value}")]
    NotPositiveInteger { param: String, value: f64 },

    #[error(transparent)]
    Predictor(#[from] PredictorError),
}

impl From<ModelError> for PredictorError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Predictor(inner) => inner,
            other => PredictorError::model(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Same value for every row.
    Constant { value: f64 },

    /// Echo one input column (persistence forecast over a lag column).
    Column { column: String },

    /// Pre-trained linear model over named columns.
    Linear {
        #[serde(default)]
        intercept: f64,
        coefficients: BTreeMap<String, f64>,
    },

    /// Mean of the last `window` training targets.
    RollingMean { window: usize },
}

impl ModelConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Constant { .. } => "constant",
            Self::Column { .. } => "column",
            Self::Linear { .. } => "linear",
            Self::RollingMean { .. } => "rolling_mean",
        }
    }

    pub fn build(&self) -> Result<BoxedPredictor, ModelError> {
        let predictor: BoxedPredictor = match self {
            Self::Constant { value } => Box::new(ConstantPredictor::new(*value)),
            Self::Column { column } => Box::new(ColumnPredictor::new(column.clone())),
            Self::Linear {
                intercept,
                coefficients,
            } => Box::new(LinearPredictor::new(*intercept, coefficients.clone())),
            Self::RollingMean { window } => Box::new(RollingMeanPredictor::new(*window)?),
        };
        Ok(predictor)
    }

    /// Copy of this configuration with grid parameters applied.
    ///
    /// - constant: `value`
    /// - linear: `intercept` or any existing coefficient name
    /// - rolling_mean: `window` (positive integer)
    /// - column: no tunable parameters
    pub fn with_params(&self, params: &ParameterCombination) -> Result<Self, ModelError> {
        let mut config = self.clone();
        for (name, value) in params.iter() {
            config.set(name, value)?;
        }
        Ok(config)
    }

    /// `with_params` followed by `build`, in the shape grid search expects.
    pub fn build_with(&self, params: &ParameterCombination) -> Result<BoxedPredictor, PredictorError> {
        Ok(self.with_params(params)?.build()?)
    }

    fn set(&mut self, name: &str, value: f64) -> Result<(), ModelError> {
        let kind = self.kind();
        let unknown = || ModelError::UnknownParameter {
            model: kind,
            param: name.to_string(),
        };

        match self {
            Self::Constant { value: v } if name == "value" => *v = value,
            Self::Linear { intercept, .. } if name == "intercept" => *intercept = value,
            Self::Linear { coefficients, .. } => match coefficients.get_mut(name) {
                Some(c) => *c = value,
                None => return Err(unknown()),
            },
            Self::RollingMean { window } if name == "window" => {
                if value < 1.0 || value.fract() != 0.0 || !value.is_finite() {
                    return Err(ModelError::NotPositiveInteger {
                        param: name.to_string(),
                        value,
                    });
                }
                *window = value as usize;
            }
            _ => return Err(unknown()),
        }
        Ok(())
    }
}
