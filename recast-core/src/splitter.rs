//! Expanding-window fold splitting.
//!
//! The training window always starts at row 0 and its end grows by `step`
//! each fold; the test window is the `horizon` rows immediately after it:
//! - Fold 0: train = [0 .. initial), test = [initial .. initial + horizon)
//! - Fold 1: train = [0 .. initial + step), test = next horizon rows
//! - etc.
//!
//! Splitting stops as soon as a test window would run past the data. A
//! request that cannot produce a single fold yields an empty sequence.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// One train/test split, as positional row ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    /// Training rows `[0, end_train)`.
    pub train: Range<usize>,
    /// Test rows `[end_train, end_train + horizon)`.
    pub test: Range<usize>,
}

impl Fold {
    /// End of the training window (exclusive), equal to the test start.
    pub fn end_train(&self) -> usize {
        self.train.end
    }

    pub fn train_indices(&self) -> Vec<usize> {
        self.train.clone().collect()
    }

    pub fn test_indices(&self) -> Vec<usize> {
        self.test.clone().collect()
    }
}

/// Expanding-window splitter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandingWindow {
    initial_train_size: usize,
    horizon: usize,
    step: usize,
}

impl ExpandingWindow {
    /// Validates that every size is at least 1.
    pub fn new(initial_train_size: usize, horizon: usize, step: usize) -> Result<Self, ForecastError> {
        if initial_train_size == 0 {
            return Err(ForecastError::invalid("initial_train_size must be positive"));
        }
        if horizon == 0 {
            return Err(ForecastError::invalid("horizon must be at least 1"));
        }
        if step == 0 {
            return Err(ForecastError::invalid("step must be at least 1"));
        }
        Ok(Self {
            initial_train_size,
            horizon,
            step,
        })
    }

    /// One-step-ahead splitter advancing one row per fold.
    pub fn one_step(initial_train_size: usize) -> Result<Self, ForecastError> {
        Self::new(initial_train_size, 1, 1)
    }

    pub fn initial_train_size(&self) -> usize {
        self.initial_train_size
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Rows needed for the first fold to exist.
    pub fn min_rows(&self) -> usize {
        self.initial_train_size.saturating_add(self.horizon)
    }

    /// Lazily generate folds over `n_samples` rows.
    ///
    /// Each call starts from scratch.
    pub fn split(&self, n_samples: usize) -> Result<Folds, ForecastError> {
        if n_samples == 0 {
            return Err(ForecastError::invalid("n_samples must be positive"));
        }
        Ok(Folds {
            n_samples,
            horizon: self.horizon,
            step: self.step,
            end_train: self.initial_train_size,
            next_index: 0,
        })
    }

    /// Number of folds `split(n_samples)` produces, without iterating.
    pub fn fold_count(&self, n_samples: usize) -> usize {
        match n_samples.checked_sub(self.min_rows()) {
            Some(slack) => slack / self.step + 1,
            None => 0,
        }
    }
}

/// Free-function form: `split(n_samples, initial_train_size, horizon, step)`.
pub fn split(
    n_samples: usize,
    initial_train_size: usize,
    horizon: usize,
    step: usize,
) -> Result<Folds, ForecastError> {
    ExpandingWindow::new(initial_train_size, horizon, step)?.split(n_samples)
}

/// Lazy fold sequence produced by [`ExpandingWindow::split`].
#[derive(Debug, Clone)]
pub struct Folds {
    n_samples: usize,
    horizon: usize,
    step: usize,
    end_train: usize,
    next_index: usize,
}

impl Folds {
    fn remaining(&self) -> usize {
        match self
            .n_samples
            .checked_sub(self.end_train.saturating_add(self.horizon))
        {
            Some(slack) => slack / self.step + 1,
            None => 0,
        }
    }
}

impl Iterator for Folds {
    type Item = Fold;

    fn next(&mut self) -> Option<Fold> {
        let test_end = self.end_train.checked_add(self.horizon)?;
        if test_end > self.n_samples {
            return None;
        }

        let fold = Fold {
            index: self.next_index,
            train: 0..self.end_train,
            test: self.end_train..test_end,
        };

        self.next_index += 1;
        // Saturate so an exhausted iterator stays exhausted.
        self.end_train = self.end_train.saturating_add(self.step);
        Some(fold)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Folds {}

impl std::iter::FusedIterator for Folds {}
