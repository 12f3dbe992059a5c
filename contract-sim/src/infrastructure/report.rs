//! Results report
//!
//! Adds the derived columns to the sweep records and writes
//! `simulation_results.json` under the output directory.

use crate::application::simulation::{RunSummary, SweepResults};
use crate::domain::{MechanismKind, ScenarioRecord};
use chrono::{DateTime, Utc};
use contract_core::{ContractMenu, stats};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const RESULTS_FILE: &str = "simulation_results.json";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A record plus the columns derived from it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub record: ScenarioRecord,
    pub welfare_per_agent: Option<f64>,
    /// `1 - SW / SW_centralized`; `None` without a usable centralized reference
    pub efficiency_loss: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu: Option<ContractMenu>,
    pub rows: Vec<ReportRow>,
    pub run_summaries: Vec<RunSummary>,
    pub skipped: Vec<MechanismKind>,
}

impl Report {
    pub fn new(name: impl Into<String>, results: &SweepResults) -> Self {
        let rows = results
            .records
            .iter()
            .map(|record| {
                let reference = results
                    .record(MechanismKind::Centralized, record.population_size)
                    .map(|c| c.social_welfare);
                ReportRow {
                    record: record.clone(),
                    welfare_per_agent: record.welfare_per_agent(),
                    efficiency_loss: reference
                        .and_then(|sw| stats::relative_loss(record.social_welfare, sw)),
                }
            })
            .collect();

        Self {
            name: name.into(),
            generated_at: Utc::now(),
            menu: None,
            rows,
            run_summaries: results.summaries.clone(),
            skipped: results.skipped.clone(),
        }
    }

    /// Attach the solved menu (builder pattern)
    pub fn with_menu(mut self, menu: ContractMenu) -> Self {
        self.menu = Some(menu);
        self
    }

    pub fn row(&self, scenario: MechanismKind, population_size: usize) -> Option<&ReportRow> {
        self.rows.iter().find(|r| {
            r.record.scenario == scenario && r.record.population_size == population_size
        })
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report into `dir`, creating it if needed
    pub fn write_json(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ReportError> {
        let dir = dir.as_ref();
        let io_error = |path: &Path, e: std::io::Error| ReportError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        };

        std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        let path = dir.join(RESULTS_FILE);
        std::fs::write(&path, self.to_json()?).map_err(|e| io_error(&path, e))?;

        tracing::info!(path = %path.display(), rows = self.rows.len(), "Report written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_core::SimulationResult;

    fn results() -> SweepResults {
        let record = |kind, n, p, a| ScenarioRecord::new(kind, n, &SimulationResult::new(p, a));
        SweepResults {
            records: vec![
                record(MechanismKind::ContractTheory, 10, 6.0, 1.5),
                record(MechanismKind::Centralized, 10, -2.0, 12.0),
                record(MechanismKind::EqualAllocation, 10, -1.5, 3.5),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_derived_columns() {
        let report = Report::new("test", &results());
        let contract = report.row(MechanismKind::ContractTheory, 10).unwrap();
        assert_eq!(contract.efficiency_loss, Some(0.25));
        assert_eq!(contract.welfare_per_agent, Some(0.75));
        let centralized = report.row(MechanismKind::Centralized, 10).unwrap();
        assert_eq!(centralized.efficiency_loss, Some(0.0));
    }

    #[test]
    fn test_no_reference_no_loss() {
        let mut results = results();
        results.records.retain(|r| r.scenario != MechanismKind::Centralized);
        let report = Report::new("test", &results);
        assert!(report.rows.iter().all(|r| r.efficiency_loss.is_none()));
    }

    #[test]
    fn test_json_uses_scenario_names() {
        let json = Report::new("test", &results()).to_json().unwrap();
        assert!(json.contains("\"scenario\": \"Contract Theory\""));
        assert!(json.contains("\"N\": 10"));
        assert!(json.contains("\"generated_at\""));
    }

    #[test]
    fn test_write_json_creates_directory() {
        let dir = std::env::temp_dir().join(format!("contract-sim-report-{}", std::process::id()));
        let path = Report::new("test", &results()).write_json(&dir).unwrap();
        assert!(path.ends_with(RESULTS_FILE));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Equal Allocation"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
