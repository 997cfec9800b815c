//! BDD tests for expanding-window cross-validation.

use recast_core::{
    ConstantPredictor, Dataset, ExpandingWindow, ForecastError, Predictor, PredictorError,
    RollingMeanPredictor, Row, Stage,
};
use recast_runner::{mean_absolute_error, CrossValidator, ScoreMetric};

fn yearly(n: usize) -> Dataset {
    let rows = (0..n)
        .map(|i| {
            let mut row = Row::new();
            row.insert("Year".into(), 2000.0 + i as f64);
            row.insert("Total_Lagged".into(), 100.0 + 10.0 * i as f64);
            row.insert("Total".into(), 110.0 + 10.0 * i as f64);
            row
        })
        .collect();
    Dataset::from_rows("Year", rows).unwrap()
}

fn validator(initial: usize, horizon: usize, step: usize) -> CrossValidator {
    CrossValidator::new(
        ExpandingWindow::new(initial, horizon, step).unwrap(),
        "Total",
        vec!["Total_Lagged".into()],
    )
}

/// Fails to fit once the training window reaches `limit` rows.
struct CapacityLimited {
    limit: usize,
}

impl Predictor for CapacityLimited {
    fn name(&self) -> &str {
        "capacity_limited"
    }

    fn fit(&mut self, rows: &[Row], _targets: &[f64]) -> Result<(), PredictorError> {
        if rows.len() >= self.limit {
            return Err(PredictorError::model("training window too large"));
        }
        Ok(())
    }

    fn predict(&self, rows: &[Row]) -> Result<Vec<f64>, PredictorError> {
        Ok(vec![0.0; rows.len()])
    }
}

#[test]
fn bdd_scenario_naive_model_over_ten_rows() {
    // GIVEN 10 rows, initial 7, horizon 1, step 1
    let ds = yearly(10);
    let cv = validator(7, 1, 1);

    // WHEN a constant model is cross-validated
    let out = cv.run(&mut ConstantPredictor::new(180.0), &ds).unwrap();

    // THEN 3 folds predict rows 7, 8, 9 (targets 180, 190, 200)
    assert_eq!(out.fold_count(), 3);
    assert_eq!(out.y_true, vec![180.0, 190.0, 200.0]);
    assert_eq!(out.y_pred, vec![180.0; 3]);
    // AND the score is the MAE over all predictions: (0 + 10 + 20) / 3
    assert!((out.score - 10.0).abs() < 1e-12);
    assert_eq!(out.folds[2].train, 0..9);
    assert_eq!(out.folds[2].test, 9..10);
}

#[test]
fn bdd_scenario_repeated_runs_are_identical() {
    // GIVEN a trainable baseline
    let ds = yearly(30);
    let cv = validator(10, 2, 3);

    // WHEN CV runs twice
    let first = cv.run(&mut RollingMeanPredictor::new(3).unwrap(), &ds).unwrap();
    let second = cv.run(&mut RollingMeanPredictor::new(3).unwrap(), &ds).unwrap();

    // THEN outcomes match exactly
    assert_eq!(first.score, second.score);
    assert_eq!(first.y_pred, second.y_pred);
    assert_eq!(first.fold_count(), cv.fold_count(&ds));
}

#[test]
fn bdd_scenario_too_few_rows_reports_insufficient_data() {
    // GIVEN 10 rows and a splitter needing 11
    let ds = yearly(10);
    let cv = validator(9, 2, 1);

    // WHEN CV runs
    let err = cv.run(&mut ConstantPredictor::new(0.0), &ds).unwrap_err();

    // THEN it is InsufficientData, not a score
    assert!(err.is_insufficient_data());
    assert!(err.to_string().contains("11"));
}

#[test]
fn bdd_scenario_fit_failure_names_the_fold() {
    // GIVEN a model that cannot fit on 6 or more rows
    let ds = yearly(10);
    let cv = validator(4, 1, 1);

    // WHEN CV runs sequentially
    let err = cv.run(&mut CapacityLimited { limit: 6 }, &ds).unwrap_err();

    // THEN the failure reports fold 2 (train 0..6) at the fit stage
    match err {
        ForecastError::PredictorFailure { stage, context, .. } => {
            assert_eq!(stage, Stage::Fit);
            assert_eq!(context.fold, Some(2));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn bdd_scenario_parallel_failure_reports_lowest_fold() {
    // GIVEN the same failing model built per fold
    let ds = yearly(40);
    let cv = validator(4, 1, 1);

    // WHEN CV runs on the rayon pool
    let err = cv
        .run_parallel(|| Ok(CapacityLimited { limit: 6 }), &ds, mean_absolute_error)
        .unwrap_err();

    // THEN the reported fold is the first failing one, not whichever finished first
    match err {
        ForecastError::PredictorFailure { context, .. } => assert_eq!(context.fold, Some(2)),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn bdd_scenario_factory_failure_is_build_stage() {
    let ds = yearly(10);
    let err = validator(5, 1, 1)
        .run_parallel(
            || RollingMeanPredictor::new(0),
            &ds,
            mean_absolute_error,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ForecastError::PredictorFailure {
            stage: Stage::Build,
            ..
        }
    ));
}

#[test]
fn bdd_scenario_metric_choice_changes_score() {
    // GIVEN errors of 0, 10, 20
    let ds = yearly(10);
    let cv = validator(7, 1, 1);
    let mut model = ConstantPredictor::new(180.0);

    // WHEN scored with RMSE
    let rmse = cv.run_with(&mut model, &ds, ScoreMetric::Rmse.as_fn()).unwrap();

    // THEN RMSE = sqrt((0 + 100 + 400) / 3)
    assert!((rmse.score - (500.0_f64 / 3.0).sqrt()).abs() < 1e-9);
}
