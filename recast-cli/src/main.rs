//! Recast CLI: expanding-window validation, tuning and recursive forecasts.
//!
//! Commands:
//! - `split`: print the folds an expanding-window splitter produces
//! - `cv`: cross-validate the configured model
//! - `tune`: grid search the configured model and save a JSON report
//! - `forecast`: print a multi-year recursive forecast
//! - `predict-year`: predict one target year and the change from the last known value

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use recast_core::ExpandingWindow;
use recast_runner::{
    export_forecast_csv, load_dataset, run_cv, run_search, save_report, CvReport,
    ExperimentConfig, ForecastPlan, LoadedData, ParameterCombination, SearchReport,
};

#[derive(Parser)]
#[command(
    name = "recast",
    about = "Recast CLI: expanding-window cross-validation and recursive forecasting"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the train/test folds for a dataset of the given size.
    Split {
        /// Number of rows in the dataset.
        #[arg(long)]
        rows: usize,

        /// Rows in the first training window.
        #[arg(long)]
        initial: usize,

        /// Rows in each test window.
        #[arg(long, default_value_t = 1)]
        horizon: usize,

        /// Rows the training window grows by per fold.
        #[arg(long, default_value_t = 1)]
        step: usize,
    },
    /// Cross-validate the model from a TOML config.
    Cv {
        /// Path to the experiment TOML.
        #[arg(long)]
        config: PathBuf,

        /// Also save the JSON report to this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the full report as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Grid search the model's parameters and save a JSON report.
    Tune {
        /// Path to the experiment TOML.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for the report.
        #[arg(long, default_value = "reports")]
        output_dir: PathBuf,

        /// Show only the best N combinations.
        #[arg(long)]
        top: Option<usize>,
    },
    /// Recursive forecast for every year up to the horizon.
    Forecast {
        /// Path to the experiment TOML.
        #[arg(long)]
        config: PathBuf,

        /// Years to forecast past the last observation.
        #[arg(long)]
        horizon: usize,

        /// Tune the target model with the grid before forecasting.
        #[arg(long, default_value_t = false)]
        tuned: bool,

        /// Also write the forecast table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Predict a single year and compare with the last known value.
    PredictYear {
        /// Path to the experiment TOML.
        #[arg(long)]
        config: PathBuf,

        /// Year to predict; must be after the last observed year.
        #[arg(long)]
        year: i64,

        /// Tune the target model with the grid before forecasting.
        #[arg(long, default_value_t = false)]
        tuned: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Split {
            rows,
            initial,
            horizon,
            step,
        } => run_split(rows, initial, horizon, step),
        Commands::Cv {
            config,
            output_dir,
            json,
        } => run_cv_cmd(&config, output_dir.as_deref(), json),
        Commands::Tune {
            config,
            output_dir,
            top,
        } => run_tune_cmd(&config, &output_dir, top),
        Commands::Forecast {
            config,
            horizon,
            tuned,
            csv,
        } => run_forecast_cmd(&config, horizon, tuned, csv.as_deref()),
        Commands::PredictYear {
            config,
            year,
            tuned,
        } => run_predict_year_cmd(&config, year, tuned),
    }
}

/// Logs go to stderr; stdout is reserved for result tables.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load(config_path: &Path) -> Result<(ExperimentConfig, LoadedData)> {
    let config = ExperimentConfig::from_file(config_path)?;
    let data = load_dataset(&config)?;
    info!(
        path = %config.dataset.path.display(),
        rows = data.dataset.len(),
        "dataset ready"
    );
    Ok((config, data))
}

fn run_split(rows: usize, initial: usize, horizon: usize, step: usize) -> Result<()> {
    let window = ExpandingWindow::new(initial, horizon, step)?;
    let folds: Vec<_> = window.split(rows)?.collect();
    if folds.is_empty() {
        bail!(
            "no folds: {rows} rows, at least {} needed",
            window.min_rows()
        );
    }

    println!("{:>5}  {:>12}  {:>12}", "fold", "train", "test");
    for fold in &folds {
        println!(
            "{:>5}  {:>12}  {:>12}",
            fold.index,
            format!("{}..{}", fold.train.start, fold.train.end),
            format!("{}..{}", fold.test.start, fold.test.end)
        );
    }
    println!("{} folds", folds.len());
    Ok(())
}

fn run_cv_cmd(config_path: &Path, output_dir: Option<&Path>, json: bool) -> Result<()> {
    let (config, data) = load(config_path)?;
    let report = run_cv(&config, &data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_cv(&report);
    }

    if let Some(dir) = output_dir {
        let path = save_report(&report, dir)?;
        println!("Report saved to: {}", path.display());
    }
    Ok(())
}

fn run_tune_cmd(config_path: &Path, output_dir: &Path, top: Option<usize>) -> Result<()> {
    let (config, data) = load(config_path)?;
    if config.grid.is_empty() {
        warn!("config has no [[grid]] parameters; scoring the model defaults");
    }
    let report = run_search(&config, &data)?;
    print_search(&report, top);

    let path = save_report(&report, output_dir)?;
    println!("Report saved to: {}", path.display());
    Ok(())
}

fn params_for(config: &ExperimentConfig, data: &LoadedData, tuned: bool) -> Result<ParameterCombination> {
    if !tuned {
        return Ok(ParameterCombination::default());
    }
    if config.forecast_section()?.target_model.is_some() {
        bail!("--tuned has no effect when [forecast.target_model] is set");
    }
    let report = run_search(config, data)?;
    println!(
        "Tuned parameters: {} ({} = {:.4})",
        report.outcome.best, report.metric, report.outcome.best_score
    );
    Ok(report.outcome.best)
}

fn run_forecast_cmd(config_path: &Path, horizon: usize, tuned: bool, csv: Option<&Path>) -> Result<()> {
    if horizon == 0 {
        bail!("--horizon must be at least 1");
    }
    let (config, data) = load(config_path)?;
    let params = params_for(&config, &data, tuned)?;
    let plan = ForecastPlan::build(&config, &data.dataset, &params)?;
    let steps = plan.forecast(&data.dataset, horizon)?;

    let section = config.forecast_section()?;
    println!();
    println!(
        "{:>6}  {:>4}  {:>16}  {:>16}",
        "year", "step", section.feature_column, config.dataset.target_column
    );
    for s in &steps {
        println!(
            "{:>6}  {:>4}  {:>16.2}  {:>16.2}",
            s.year, s.step, s.feature_value, s.target_value
        );
    }

    if let Some(path) = csv {
        std::fs::write(path, export_forecast_csv(&steps)?)?;
        println!("Forecast written to: {}", path.display());
    }
    Ok(())
}

fn run_predict_year_cmd(config_path: &Path, year: i64, tuned: bool) -> Result<()> {
    let (config, data) = load(config_path)?;
    let params = params_for(&config, &data, tuned)?;
    let plan = ForecastPlan::build(&config, &data.dataset, &params)?;
    let target = &config.dataset.target_column;
    let prediction = plan.predict_year(&data.dataset, target, year)?;

    println!();
    println!("=== Prediction for {year} ===");
    println!("Steps ahead:    {}", prediction.step.step);
    println!("{:<15} {:.2}", format!("{target}:"), prediction.step.target_value);
    println!(
        "Last known:     {:.2} ({})",
        prediction.last_known_value, prediction.last_known_year
    );
    match prediction.change.percent {
        Some(pct) => println!(
            "Change:         {:+.2} ({:+.2}%)",
            prediction.change.absolute, pct
        ),
        None => println!("Change:         {:+.2}", prediction.change.absolute),
    }
    Ok(())
}

fn print_cv(report: &CvReport) {
    let outcome = &report.outcome;
    println!();
    println!("=== Cross-Validation ===");
    println!("Model:          {}", report.config.model.kind());
    println!("Folds:          {}", outcome.fold_count());
    println!("Predictions:    {}", outcome.y_pred.len());
    println!("{:<15} {:.4}", format!("{}:", report.metric), outcome.score);
    println!();
    println!("{:>5}  {:>10}  {:>12}  {:>10}", "fold", "train", "test", "MAE");
    for fold in &outcome.folds {
        println!(
            "{:>5}  {:>10}  {:>12}  {:>10.4}",
            fold.fold_index,
            fold.train.len(),
            format!("{}..{}", fold.test.start, fold.test.end),
            fold.fold_mae
        );
    }
}

fn print_search(report: &SearchReport, top: Option<usize>) {
    let outcome = &report.outcome;
    println!();
    println!("=== Grid Search ===");
    println!("Combinations:   {}", outcome.results.len());
    println!("Best:           {}", outcome.best);
    println!("{:<15} {:.4}", format!("Best {}:", report.metric), outcome.best_score);
    println!();

    let ranked = outcome.ranked();
    let shown = top.unwrap_or(ranked.len()).min(ranked.len());
    println!("{:>4}  {:>12}  params", "rank", report.metric);
    for (rank, record) in ranked.iter().take(shown).enumerate() {
        println!(
            "{:>4}  {:>12.4}  {}",
            rank + 1,
            record.score,
            record.combination
        );
    }
}
