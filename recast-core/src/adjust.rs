//! Optional post-processing of forecast steps.
//!
//! These are caller-level policies, never applied by the forecaster itself.
//! Policies run in the order given to [`apply_all`].

use serde::{Deserialize, Serialize};

use crate::forecaster::ForecastStep;

/// A post-processing rule over forecast steps.
pub trait Adjustment {
    fn name(&self) -> &str;
    fn apply(&self, steps: &mut [ForecastStep]);
}

/// Apply each adjustment in turn.
pub fn apply_all(adjustments: &[Box<dyn Adjustment + Send + Sync>], steps: &mut [ForecastStep]) {
    for adjustment in adjustments {
        adjustment.apply(steps);
    }
}

/// Clamp negative feature and target predictions to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClampNonNegative;

impl Adjustment for ClampNonNegative {
    fn name(&self) -> &str {
        "clamp_non_negative"
    }

    fn apply(&self, steps: &mut [ForecastStep]) {
        for step in steps {
            step.feature_value = step.feature_value.max(0.0);
            step.target_value = step.target_value.max(0.0);
        }
    }
}

/// Multiply every target prediction by a fixed ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioScale {
    pub ratio: f64,
}

impl RatioScale {
    /// Ratio between a current and a reference level (e.g. population now vs. at training time).
    pub fn between(current: f64, reference: f64) -> Option<Self> {
        if reference == 0.0 || !reference.is_finite() || !current.is_finite() {
            return None;
        }
        Some(Self {
            ratio: current / reference,
        })
    }
}

impl Adjustment for RatioScale {
    fn name(&self) -> &str {
        "ratio_scale"
    }

    fn apply(&self, steps: &mut [ForecastStep]) {
        for step in steps {
            step.target_value *= self.ratio;
        }
    }
}

/// Replace non-finite or negative targets with a trailing mean of observed values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingMeanFallback {
    pub fallback: f64,
}

impl TrailingMeanFallback {
    pub const DEFAULT_WINDOW: usize = 3;

    /// Mean of the last `window` values of `history`. `None` if there is nothing to average.
    pub fn from_history(history: &[f64], window: usize) -> Option<Self> {
        let tail = &history[history.len().saturating_sub(window)..];
        if tail.is_empty() {
            return None;
        }
        Some(Self {
            fallback: tail.iter().sum::<f64>() / tail.len() as f64,
        })
    }
}

impl Adjustment for TrailingMeanFallback {
    fn name(&self) -> &str {
        "trailing_mean_fallback"
    }

    fn apply(&self, steps: &mut [ForecastStep]) {
        for step in steps {
            if !step.target_value.is_finite() || step.target_value < 0.0 {
                step.target_value = self.fallback;
            }
        }
    }
}

/// Change of a predicted value relative to the last observed one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub absolute: f64,
    /// Percentage change; `None` when the baseline is zero.
    pub percent: Option<f64>,
}

impl Change {
    pub fn between(baseline: f64, predicted: f64) -> Self {
        let absolute = predicted - baseline;
        let percent = (baseline != 0.0).then(|| absolute / baseline * 100.0);
        Self { absolute, percent }
    }
}
