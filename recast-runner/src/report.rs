//! Persisted artifacts: JSON reports for CV and grid search runs, CSV
//! forecast tables.
//!
//! Every JSON report carries a `schema_version`. Unknown (newer) versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use recast_core::ForecastStep;

use crate::config::ExperimentConfig;
use crate::cv::CvOutcome;
use crate::grid::SearchOutcome;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Result of one cross-validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvReport {
    pub schema_version: u32,
    pub dataset_hash: String,
    pub metric: String,
    pub config: ExperimentConfig,
    pub outcome: CvOutcome,
}

/// Result of one grid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub schema_version: u32,
    pub dataset_hash: String,
    pub metric: String,
    pub config: ExperimentConfig,
    pub outcome: SearchOutcome,
}

impl CvReport {
    pub fn new(config: &ExperimentConfig, dataset_hash: &str, outcome: CvOutcome) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            dataset_hash: dataset_hash.to_string(),
            metric: config.validation.metric.label().to_string(),
            config: config.clone(),
            outcome,
        }
    }
}

impl SearchReport {
    pub fn new(config: &ExperimentConfig, dataset_hash: &str, outcome: SearchOutcome) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            dataset_hash: dataset_hash.to_string(),
            metric: config.validation.metric.label().to_string(),
            config: config.clone(),
            outcome,
        }
    }
}

/// Shared by the report types so one save/load path serves both.
pub trait Report: Serialize + DeserializeOwned {
    /// File name prefix, e.g. `cv` or `search`.
    const KIND: &'static str;

    fn schema_version(&self) -> u32;
    fn dataset_hash(&self) -> &str;
}

impl Report for CvReport {
    const KIND: &'static str = "cv";

    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn dataset_hash(&self) -> &str {
        &self.dataset_hash
    }
}

impl Report for SearchReport {
    const KIND: &'static str = "search";

    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn dataset_hash(&self) -> &str {
        &self.dataset_hash
    }
}

pub fn export_json<R: Report>(report: &R) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn import_json<R: Report>(json: &str) -> Result<R, ReportError> {
    let report: R = serde_json::from_str(json)?;
    if report.schema_version() > SCHEMA_VERSION {
        return Err(ReportError::UnsupportedSchema {
            found: report.schema_version(),
            supported: SCHEMA_VERSION,
        });
    }
    Ok(report)
}

/// Write `{kind}_{hash prefix}.json` under `output_dir`, creating it if needed.
///
/// Re-running on the same dataset overwrites the previous report.
pub fn save_report<R: Report>(report: &R, output_dir: &Path) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(output_dir).map_err(io_error(output_dir))?;
    let hash = report.dataset_hash();
    let prefix = &hash[..hash.len().min(12)];
    let path = output_dir.join(format!("{}_{prefix}.json", R::KIND));
    std::fs::write(&path, export_json(report)?).map_err(io_error(&path))?;
    Ok(path)
}

pub fn load_report<R: Report>(path: &Path) -> Result<R, ReportError> {
    let json = std::fs::read_to_string(path).map_err(io_error(path))?;
    import_json(&json)
}

/// Forecast steps as CSV: `year,step,feature,target`.
pub fn export_forecast_csv(steps: &[ForecastStep]) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["year", "step", "feature", "target"])?;
    for s in steps {
        wtr.write_record([
            s.year.to_string(),
            s.step.to_string(),
            format!("{:.6}", s.feature_value),
            format!("{:.6}", s.target_value),
        ])?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| ReportError::Io {
            path: PathBuf::from("<memory>"),
            source: e.into_error(),
        })?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_csv_has_header_and_rows() {
        let steps = vec![
            ForecastStep {
                year: 2021,
                step: 1,
                feature_value: 4300.0,
                target_value: 260.0,
            },
            ForecastStep {
                year: 2022,
                step: 2,
                feature_value: 4350.0,
                target_value: 270.5,
            },
        ];
        let csv = export_forecast_csv(&steps).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "year,step,feature,target");
        assert_eq!(lines[2], "2022,2,4350.000000,270.500000");
        assert_eq!(lines.len(), 3);
    }
}
