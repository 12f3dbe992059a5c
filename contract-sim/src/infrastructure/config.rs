//! Scenario configuration
//!
//! One JSON file describes a whole experiment. Every field is optional and
//! falls back to the reference scenario:
//! - two types, `low (0.5, 0.5)` and `high (1.0, 0.5)`
//! - costs `c1 = 0.01`, `c2 = 0.005`, pool of 100 MHz
//! - population sweep 10..=100, 100 repetitions, seed 42

use super::diagnostics::DiagnosticsConfig;
use crate::application::agents::SelectionConfig;
use crate::application::mechanism::DesignerConfig;
use crate::application::simulation::MonteCarloConfig;
use contract_core::{AgentType, ConfigError, DEFAULT_EPSILON, TypeDistribution, UtilityModel};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub name: String,
    pub agent_types: Vec<AgentType>,
    pub cost: CostConfig,
    pub total_resource_hz: f64,
    pub population_sizes: Vec<usize>,
    pub repetitions: usize,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub trace_first_agent: bool,
    pub designer: DesignerSection,
    pub selection: SelectionConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Principal's operating cost per MHz
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub c1: f64,
    pub c2: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        let model = UtilityModel::default();
        Self {
            c1: model.c1,
            c2: model.c2,
        }
    }
}

/// Optimizer tunables plus the utility epsilon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignerSection {
    pub epsilon: f64,
    #[serde(flatten)]
    pub optimizer: DesignerConfig,
}

impl Default for DesignerSection {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            optimizer: DesignerConfig::default(),
        }
    }
}

fn default_scenario_name() -> String {
    "Satellite spectrum sharing".to_string()
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let sweep = MonteCarloConfig::default();
        Self {
            name: default_scenario_name(),
            agent_types: vec![
                AgentType::new("low", 0.5, 0.5),
                AgentType::new("high", 1.0, 0.5),
            ],
            cost: CostConfig::default(),
            total_resource_hz: sweep.total_resource_hz,
            population_sizes: sweep.population_sizes,
            repetitions: sweep.repetitions,
            seed: sweep.seed,
            parallel: sweep.parallel,
            trace_first_agent: sweep.trace_first_agent,
            designer: DesignerSection::default(),
            selection: SelectionConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Set population sizes (builder pattern)
    pub fn with_population_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.population_sizes = sizes;
        self
    }

    /// Set repetitions (builder pattern)
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Check everything that can be checked before solving anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.type_distribution()?;
        self.utility_model().validate()?;
        if !self.total_resource_hz.is_finite() || self.total_resource_hz <= 0.0 {
            return Err(ConfigError::InvalidResourcePool(self.total_resource_hz));
        }
        if self.repetitions == 0 {
            return Err(ConfigError::InvalidSetting(
                "repetitions must be at least 1".to_string(),
            ));
        }
        if self.population_sizes.is_empty() {
            return Err(ConfigError::InvalidSetting(
                "population_sizes is empty".to_string(),
            ));
        }
        let margin = self.designer.optimizer.ic_margin;
        if !margin.is_finite() || margin < 0.0 {
            return Err(ConfigError::InvalidSetting(format!(
                "ic_margin must be non-negative, got {}",
                margin
            )));
        }
        if self.diagnostics.enabled {
            self.diagnostics.validate()?;
        }
        Ok(())
    }

    pub fn type_distribution(&self) -> Result<TypeDistribution, ConfigError> {
        TypeDistribution::new(self.agent_types.clone())
    }

    pub fn utility_model(&self) -> UtilityModel {
        UtilityModel::new(self.cost.c1, self.cost.c2).with_epsilon(self.designer.epsilon)
    }

    pub fn monte_carlo(&self) -> MonteCarloConfig {
        MonteCarloConfig {
            population_sizes: self.population_sizes.clone(),
            repetitions: self.repetitions,
            total_resource_hz: self.total_resource_hz,
            seed: self.seed,
            parallel: self.parallel,
            trace_first_agent: self.trace_first_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_reference_scenario() {
        let config = ScenarioConfig::default();
        assert!(config.validate().is_ok());
        let types = config.type_distribution().unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(config.utility_model(), UtilityModel::default());
        assert_eq!(config.total_resource_hz, 100e6);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ScenarioConfig::from_json(
            r#"{
                "cost": { "c1": 0.02 },
                "repetitions": 5,
                "designer": { "ic_margin": 1e-5, "epsilon": 1e-8 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.cost.c1, 0.02);
        assert_eq!(config.cost.c2, 0.005);
        assert_eq!(config.repetitions, 5);
        assert_eq!(config.designer.optimizer.ic_margin, 1e-5);
        assert_eq!(config.designer.optimizer.max_iterations, 1000);
        assert_eq!(config.utility_model().epsilon, 1e-8);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_rejects_bad_probabilities() {
        let config = ScenarioConfig::from_json(
            r#"{ "agent_types": [
                { "name": "low", "theta": 0.5, "prob": 0.5 },
                { "name": "high", "theta": 1.0, "prob": 0.6 }
            ] }"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ProbabilitySum(_))));
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let mut config = ScenarioConfig::default();
        config.agent_types = vec![AgentType::new("a", 1.0, 0.5), AgentType::new("a", 2.0, 0.5)];
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateType(_))));

        config.agent_types.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyTypeSet)));
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let mut config = ScenarioConfig::default();
        config.cost.c2 = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCost { .. })));

        let mut config = ScenarioConfig::default();
        config.total_resource_hz = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidResourcePool(_))));

        let config = ScenarioConfig::default().with_repetitions(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSetting(_))));
    }

    #[test]
    fn test_rejects_bad_diagnostics() {
        let config = ScenarioConfig::from_json(r#"{ "diagnostics": { "users_per_operator": 0.0 } }"#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSetting(_))));

        let mut config = ScenarioConfig::default();
        config.diagnostics.area_height_m = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSetting(_))));

        // Ignored while diagnostics are off
        config.diagnostics.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_and_io_errors() {
        assert!(matches!(ScenarioConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            ScenarioConfig::from_file("/nonexistent/scenario.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
