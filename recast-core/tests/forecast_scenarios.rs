//! Scenario tests for recursive forecasting over a small yearly dataset.

use recast_core::{
    apply_all, Adjustment, Change, ClampNonNegative, ConstantPredictor, Dataset, ForecastError,
    LaggedSeed, LinearPredictor, Predictor, PredictorError, RecursiveForecaster, Row, SeedSource,
    TrailingMeanFallback,
};

fn row(pairs: &[(&str, f64)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn yearly_dataset() -> Dataset {
    let rows = (2015..=2020)
        .map(|year| {
            let i = (year - 2015) as f64;
            row(&[
                ("Year", year as f64),
                ("Total", 200.0 + 10.0 * i),
                ("Population", 4_000.0 + 50.0 * i),
            ])
        })
        .collect();
    Dataset::from_rows("Year", rows).unwrap()
}

fn lags() -> Vec<(String, String)> {
    vec![
        ("Total".into(), "Total_Lagged".into()),
        ("Population".into(), "Population_lagged".into()),
    ]
}

fn forecaster() -> RecursiveForecaster {
    RecursiveForecaster::new("Population_lagged", "Year", "Total_Lagged")
}

/// Population grows by 50 each year; total is lagged total plus 10.
fn growth_models() -> (LinearPredictor, LinearPredictor) {
    let population = LinearPredictor::new(
        50.0,
        [("Population_lagged".to_string(), 1.0)].into_iter().collect(),
    );
    let total = LinearPredictor::new(
        10.0,
        [("Total_Lagged".to_string(), 1.0)].into_iter().collect(),
    );
    (population, total)
}

#[test]
fn seed_with_constant_models() {
    let seed = row(&[
        ("Total_Lagged", 100.0),
        ("Year", 2020.0),
        ("Population_lagged", 1000.0),
    ]);
    let steps = forecaster()
        .forecast(
            &seed,
            &ConstantPredictor::new(1100.0),
            &ConstantPredictor::new(150.0),
            2,
        )
        .unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!((steps[0].year, steps[0].step), (2020, 1));
    assert_eq!((steps[1].year, steps[1].step), (2021, 2));
    for s in &steps {
        assert_eq!(s.feature_value, 1100.0);
        assert_eq!(s.target_value, 150.0);
    }
}

#[test]
fn predict_for_year_matches_full_forecast() {
    // GIVEN a dataset ending in 2020 and linear growth models
    let ds = yearly_dataset();
    let seeds = LaggedSeed::new(&ds, lags());
    let (population, total) = growth_models();

    // WHEN predicting 2023 directly and via the full forecast
    let step = forecaster()
        .predict_for_year(2023, &seeds, &population, &total)
        .unwrap();
    let seed = seeds.seed().unwrap();
    let all = forecaster()
        .forecast(&seed.row, &population, &total, 3)
        .unwrap();

    // THEN the horizon is exactly target - last and the steps agree
    assert_eq!(step.year, 2023);
    assert_eq!(step.step, 3);
    assert_eq!(all.last().copied(), Some(step));
    assert_eq!(all.iter().map(|s| s.year).collect::<Vec<_>>(), vec![2021, 2022, 2023]);

    // 2020 total is 250 → 260, 270, 280; population 4250 → 4300, 4350, 4400
    assert!((step.target_value - 280.0).abs() < 1e-9);
    assert!((step.feature_value - 4_400.0).abs() < 1e-9);
}

#[test]
fn predict_for_next_year_is_one_step() {
    let ds = yearly_dataset();
    let (population, total) = growth_models();
    let step = forecaster()
        .predict_for_year(2021, &LaggedSeed::new(&ds, lags()), &population, &total)
        .unwrap();
    assert_eq!(step.step, 1);
    assert!((step.target_value - 260.0).abs() < 1e-9);
}

#[test]
fn predict_for_known_year_is_invalid() {
    let ds = yearly_dataset();
    let (population, total) = growth_models();
    let err = forecaster()
        .predict_for_year(2020, &LaggedSeed::new(&ds, lags()), &population, &total)
        .unwrap_err();
    assert!(matches!(err, ForecastError::InvalidArgument(_)));
    assert!(err.to_string().contains("strictly after"));
}

#[test]
fn empty_dataset_cannot_seed() {
    let ds = Dataset::from_rows("Year", Vec::new()).unwrap();
    let err = LaggedSeed::new(&ds, lags()).seed().unwrap_err();
    assert!(matches!(err, ForecastError::InvalidArgument(_)));
}

/// Fails on the second call to `predict`.
struct FlakyPredictor {
    calls: std::cell::Cell<usize>,
}

impl Predictor for FlakyPredictor {
    fn name(&self) -> &str {
        "flaky"
    }

    fn predict(&self, rows: &[Row]) -> Result<Vec<f64>, PredictorError> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        if n >= 2 {
            return Err(PredictorError::model("model exploded"));
        }
        Ok(vec![1.0; rows.len()])
    }
}

#[test]
fn failure_mid_horizon_propagates_with_year() {
    let ds = yearly_dataset();
    let seed = LaggedSeed::new(&ds, lags()).seed().unwrap();
    let flaky = FlakyPredictor {
        calls: std::cell::Cell::new(0),
    };

    let err = forecaster()
        .forecast(&seed.row, &ConstantPredictor::new(1.0), &flaky, 5)
        .unwrap_err();
    match err {
        ForecastError::PredictorFailure { context, .. } => assert_eq!(context.year, Some(2022)),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn adjustments_are_applied_by_the_caller() {
    let ds = yearly_dataset();
    let seed = LaggedSeed::new(&ds, lags()).seed().unwrap();
    let mut steps = forecaster()
        .forecast(
            &seed.row,
            &ConstantPredictor::new(-10.0),
            &ConstantPredictor::new(-5.0),
            2,
        )
        .unwrap();

    // The forecaster itself never clamps
    assert!(steps.iter().all(|s| s.target_value < 0.0));

    let history = ds.column("Total").unwrap();
    let adjustments: Vec<Box<dyn Adjustment + Send + Sync>> = vec![
        Box::new(TrailingMeanFallback::from_history(&history, 3).unwrap()),
        Box::new(ClampNonNegative),
    ];
    apply_all(&adjustments, &mut steps);

    // mean of 230, 240, 250
    assert!(steps.iter().all(|s| (s.target_value - 240.0).abs() < 1e-9));
    assert!(steps.iter().all(|s| s.feature_value == 0.0));

    let change = Change::between(250.0, steps[0].target_value);
    assert!((change.absolute + 10.0).abs() < 1e-9);
    assert!((change.percent.unwrap() + 4.0).abs() < 1e-9);
}
