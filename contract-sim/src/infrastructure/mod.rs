//! Infrastructure layer
//!
//! - **config**: JSON scenario files
//! - **report**: results file with derived columns
//! - **diagnostics**: node deployment and channel gains, logged only

pub mod config;
pub mod diagnostics;
pub mod report;

pub use config::{CostConfig, DesignerSection, ScenarioConfig};
pub use diagnostics::{ChannelReport, DiagnosticsConfig, run_diagnostics};
pub use report::{RESULTS_FILE, Report, ReportError, ReportRow};
