//! Aggregated utilities over a population

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Summed Principal and Agent utility
///
/// Social welfare is always derived from the two components, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub principal_utility: f64,
    pub agents_utility: f64,
}

impl SimulationResult {
    pub const ZERO: SimulationResult = SimulationResult {
        principal_utility: 0.0,
        agents_utility: 0.0,
    };

    pub fn new(principal_utility: f64, agents_utility: f64) -> Self {
        Self {
            principal_utility,
            agents_utility,
        }
    }

    #[inline]
    pub fn social_welfare(&self) -> f64 {
        self.principal_utility + self.agents_utility
    }

    /// Record one agent's accepted contract
    #[inline]
    pub fn record(&mut self, principal: f64, agent: f64) {
        self.principal_utility += principal;
        self.agents_utility += agent;
    }

    /// Divide both components, used to average repetition sums
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            principal_utility: self.principal_utility * factor,
            agents_utility: self.agents_utility * factor,
        }
    }
}

impl AddAssign for SimulationResult {
    fn add_assign(&mut self, rhs: Self) {
        self.principal_utility += rhs.principal_utility;
        self.agents_utility += rhs.agents_utility;
    }
}
