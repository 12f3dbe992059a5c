use contract_core::SimulationResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allocation regime under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MechanismKind {
    #[serde(rename = "Contract Theory")]
    ContractTheory,
    #[serde(rename = "Centralized")]
    Centralized,
    #[serde(rename = "Equal Allocation")]
    EqualAllocation,
}

impl MechanismKind {
    pub const ALL: [MechanismKind; 3] = [
        MechanismKind::ContractTheory,
        MechanismKind::Centralized,
        MechanismKind::EqualAllocation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MechanismKind::ContractTheory => "Contract Theory",
            MechanismKind::Centralized => "Centralized",
            MechanismKind::EqualAllocation => "Equal Allocation",
        }
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One (mechanism, population size) row, averaged over repetitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub scenario: MechanismKind,
    #[serde(rename = "N")]
    pub population_size: usize,
    pub principal_utility: f64,
    pub agents_utility: f64,
    pub social_welfare: f64,
}

impl ScenarioRecord {
    /// Welfare is always derived from the two utility components
    pub fn new(scenario: MechanismKind, population_size: usize, result: &SimulationResult) -> Self {
        Self {
            scenario,
            population_size,
            principal_utility: result.principal_utility,
            agents_utility: result.agents_utility,
            social_welfare: result.social_welfare(),
        }
    }

    /// Welfare per agent, `None` for an empty population
    pub fn welfare_per_agent(&self) -> Option<f64> {
        (self.population_size > 0).then(|| self.social_welfare / self.population_size as f64)
    }
}
