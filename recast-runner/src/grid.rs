//! Exhaustive hyperparameter grid search scored by cross-validation.
//!
//! Every combination of the grid is built into a fresh predictor, scored
//! with the configured [`CrossValidator`], and the combination with the
//! lowest score wins. Ties go to the combination enumerated first.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use recast_core::{Dataset, FailureContext, ForecastError, Predictor, PredictorError, Stage};

use crate::cv::CrossValidator;

// ─── Grid ────────────────────────────────────────────────────────────

/// One named parameter axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<f64>,
}

/// Ordered mapping from parameter name to candidate values.
///
/// Key order is the order axes were added; combinations enumerate with the
/// last axis varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterGrid {
    axes: Vec<GridAxis>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ParameterGrid::push`]. Values are checked by
    /// [`ParameterGrid::validate`].
    pub fn with(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.push(name, values);
        self
    }

    /// Adds an axis, replacing the values of an existing axis of the same name.
    pub fn push(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        match self.axes.iter_mut().find(|a| a.name == name) {
            Some(axis) => axis.values = values,
            None => self.axes.push(GridAxis { name, values }),
        }
    }

    pub fn from_axes(axes: Vec<GridAxis>) -> Self {
        let mut grid = Self::new();
        for axis in axes {
            grid.push(axis.name, axis.values);
        }
        grid
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Rejects axes with no values and non-finite values.
    pub fn validate(&self) -> Result<(), ForecastError> {
        for axis in &self.axes {
            if axis.values.is_empty() {
                return Err(ForecastError::invalid(format!(
                    "grid parameter '{}' has no values",
                    axis.name
                )));
            }
            if axis.values.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::invalid(format!(
                    "grid parameter '{}' has a non-finite value",
                    axis.name
                )));
            }
        }
        Ok(())
    }

    /// Number of combinations (1 for an empty grid).
    pub fn size(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Cartesian product in lexicographic order of the axes.
    pub fn combinations(&self) -> Vec<ParameterCombination> {
        let mut out = vec![ParameterCombination::default()];
        for axis in &self.axes {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |&v| {
                        let mut next = prefix.clone();
                        next.values.push((axis.name.clone(), v));
                        next
                    })
                })
                .collect();
        }
        out
    }
}

/// One assignment of a value to every grid parameter, in grid key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterCombination {
    values: Vec<(String, f64)>,
}

impl ParameterCombination {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl fmt::Display for ParameterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return f.write_str("(defaults)");
        }
        for (i, (k, v)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

// ─── Results ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    Scored,
    /// Too few rows for a single fold; score is +∞.
    InsufficientData,
    /// The metric came out NaN; score is +∞.
    Invalid,
}

/// Score of one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub combination: ParameterCombination,
    #[serde(deserialize_with = "score_or_infinity")]
    pub score: f64,
    pub status: ScoreStatus,
}

// JSON has no infinity; serde_json writes it as null.
fn score_or_infinity<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
}

// NaN of either sign sorts after every number, +∞ included.
fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NAN.copysign(1.0)
    } else {
        score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best: ParameterCombination,
    #[serde(deserialize_with = "score_or_infinity")]
    pub best_score: f64,
    /// All records in enumeration order.
    pub results: Vec<ScoreRecord>,
}

impl SearchOutcome {
    /// Records sorted best-first, ties kept in enumeration order.
    pub fn ranked(&self) -> Vec<&ScoreRecord> {
        let mut ranked: Vec<&ScoreRecord> = self.results.iter().collect();
        ranked.sort_by(|a, b| rank_key(a.score).total_cmp(&rank_key(b.score)));
        ranked
    }
}

// ─── Search ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GridSearch {
    pub cv: CrossValidator,
    pub grid: ParameterGrid,
    /// Score combinations on the rayon pool.
    pub parallel: bool,
}

impl GridSearch {
    pub fn new(cv: CrossValidator, grid: ParameterGrid) -> Self {
        Self {
            cv,
            grid,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Score every combination and pick the lowest.
    ///
    /// A combination whose dataset yields no folds scores +∞; any other
    /// failure aborts the search with the combination attached.
    pub fn search<F, P, S>(
        &self,
        factory: F,
        dataset: &Dataset,
        score_fn: S,
    ) -> Result<SearchOutcome, ForecastError>
    where
        F: Fn(&ParameterCombination) -> Result<P, PredictorError> + Sync,
        P: Predictor,
        S: Fn(&[f64], &[f64]) -> f64 + Sync,
    {
        self.grid.validate()?;
        let combinations = self.grid.combinations();
        info!(
            combinations = combinations.len(),
            parallel = self.parallel,
            "starting grid search"
        );

        let evaluate = |combo: &ParameterCombination| self.score_one(&factory, combo, dataset, &score_fn);

        let results: Vec<ScoreRecord> = if self.parallel {
            let scored: Vec<Result<ScoreRecord, ForecastError>> =
                combinations.par_iter().map(evaluate).collect();
            scored.into_iter().collect::<Result<_, _>>()?
        } else {
            combinations
                .iter()
                .map(evaluate)
                .collect::<Result<_, _>>()?
        };

        let (best_index, best_score) = results
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, r)| match best {
                Some((_, s)) if rank_key(s).total_cmp(&rank_key(r.score)).is_le() => best,
                _ => Some((i, r.score)),
            })
            .ok_or_else(|| ForecastError::invalid("grid produced no combinations"))?;

        Ok(SearchOutcome {
            best: results[best_index].combination.clone(),
            best_score,
            results,
        })
    }

    fn score_one<F, P, S>(
        &self,
        factory: &F,
        combo: &ParameterCombination,
        dataset: &Dataset,
        score_fn: &S,
    ) -> Result<ScoreRecord, ForecastError>
    where
        F: Fn(&ParameterCombination) -> Result<P, PredictorError>,
        P: Predictor,
        S: Fn(&[f64], &[f64]) -> f64,
    {
        let label = combo.to_string();
        let mut predictor = factory(combo).map_err(|e| {
            ForecastError::predictor(Stage::Build, FailureContext::default(), e)
                .with_combination(&label)
        })?;

        let record = match self.cv.run_with(&mut predictor, dataset, score_fn) {
            Ok(outcome) if outcome.score.is_nan() => {
                warn!(params = %label, "metric is NaN for combination, scoring +inf");
                ScoreRecord {
                    combination: combo.clone(),
                    score: f64::INFINITY,
                    status: ScoreStatus::Invalid,
                }
            }
            Ok(outcome) => ScoreRecord {
                combination: combo.clone(),
                score: outcome.score,
                status: ScoreStatus::Scored,
            },
            Err(e) if e.is_insufficient_data() => {
                warn!(params = %label, error = %e, "no folds for combination, scoring +inf");
                ScoreRecord {
                    combination: combo.clone(),
                    score: f64::INFINITY,
                    status: ScoreStatus::InsufficientData,
                }
            }
            Err(e) => return Err(e.with_combination(&label)),
        };

        info!(params = %label, score = record.score, "combination scored");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_puts_negative_nan_last() {
        let record = |v: f64, score: f64| ScoreRecord {
            combination: ParameterGrid::new().with("v", vec![v]).combinations().remove(0),
            score,
            status: ScoreStatus::Scored,
        };
        let outcome = SearchOutcome {
            best: ParameterCombination::default(),
            best_score: 1.0,
            results: vec![
                record(0.0, -f64::NAN),
                record(1.0, f64::INFINITY),
                record(2.0, 1.0),
            ],
        };
        let order: Vec<Option<f64>> = outcome
            .ranked()
            .iter()
            .map(|r| r.combination.get("v"))
            .collect();
        assert_eq!(order, vec![Some(2.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn empty_grid_has_single_default_combination() {
        let grid = ParameterGrid::new();
        assert_eq!(grid.size(), 1);
        let combos = grid.combinations();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
        assert_eq!(combos[0].to_string(), "(defaults)");
    }

    #[test]
    fn combinations_vary_last_axis_fastest() {
        let grid = ParameterGrid::new()
            .with("a", vec![1.0, 2.0])
            .with("b", vec![10.0, 20.0, 30.0]);
        let combos = grid.combinations();
        assert_eq!(grid.size(), 6);
        assert_eq!(combos.len(), 6);
        let labels: Vec<String> = combos.iter().map(|c| c.to_string()).collect();
        assert_eq!(labels[0], "a=1, b=10");
        assert_eq!(labels[1], "a=1, b=20");
        assert_eq!(labels[3], "a=2, b=10");
        assert_eq!(combos[5].get("b"), Some(30.0));
        assert_eq!(combos[5].get("c"), None);
    }

    #[test]
    fn push_replaces_existing_axis() {
        let mut grid = ParameterGrid::new().with("a", vec![1.0]);
        grid.push("a", vec![2.0, 3.0]);
        assert_eq!(grid.axes().len(), 1);
        assert_eq!(grid.size(), 2);
    }

    #[test]
    fn empty_axis_is_invalid() {
        let grid = ParameterGrid::new().with("window", vec![]);
        assert!(matches!(grid.validate(), Err(ForecastError::InvalidArgument(_))));
    }

    #[test]
    fn nan_value_is_invalid() {
        let grid = ParameterGrid::new().with("alpha", vec![f64::NAN]);
        assert!(grid.validate().is_err());
    }

    #[test]
    fn ranked_sorts_ascending_and_keeps_ties_stable() {
        let rec = |v: f64, s: f64| ScoreRecord {
            combination: ParameterGrid::new().with("k", vec![v]).combinations().remove(0),
            score: s,
            status: ScoreStatus::Scored,
        };
        let outcome = SearchOutcome {
            best: ParameterCombination::default(),
            best_score: 2.0,
            results: vec![rec(1.0, 5.0), rec(2.0, 2.0), rec(3.0, 2.0)],
        };
        let ranked: Vec<Option<f64>> = outcome.ranked().iter().map(|r| r.combination.get("k")).collect();
        assert_eq!(ranked, vec![Some(2.0), Some(3.0), Some(1.0)]);
    }

    #[test]
    fn grid_deserializes_from_axis_list() {
        #[derive(Deserialize)]
        struct Wrapper {
            grid: ParameterGrid,
        }
        let w: Wrapper = toml::from_str(
            r#"
            [[grid]]
            name = "window"
            values = [2, 3]

            [[grid]]
            name = "alpha"
            values = [0.5]
            "#,
        )
        .unwrap();
        let names: Vec<&str> = w.grid.axes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["window", "alpha"]);
        assert_eq!(w.grid.size(), 2);
    }
}
