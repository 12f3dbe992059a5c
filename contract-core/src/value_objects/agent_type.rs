//! Agent types and the discrete type distribution
//!
//! An agent's type is its private efficiency `theta` at converting granted
//! resource into utility. The Principal only knows the distribution.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Allowed deviation of `sum(prob)` from 1
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// A privately-known agent type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentType {
    /// Type label, unique within a distribution
    pub name: String,
    /// Efficiency parameter (> 0)
    pub theta: f64,
    /// Probability mass in (0, 1]
    pub prob: f64,
}

impl AgentType {
    pub fn new(name: impl Into<String>, theta: f64, prob: f64) -> Self {
        Self {
            name: name.into(),
            theta,
            prob,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.theta.is_finite() && self.theta > 0.0) {
            return Err(ConfigError::InvalidTheta {
                name: self.name.clone(),
                theta: self.theta,
            });
        }
        if !(self.prob.is_finite() && self.prob > 0.0 && self.prob <= 1.0) {
            return Err(ConfigError::InvalidProbability {
                name: self.name.clone(),
                prob: self.prob,
            });
        }
        Ok(())
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(theta={}, p={})", self.name, self.theta, self.prob)
    }
}

/// Validated, finite distribution over agent types
///
/// Declaration order is preserved: menus are built and evaluated in this order,
/// which makes the first-seen tie-break in agent selection deterministic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDistribution {
    types: Vec<AgentType>,
}

impl TypeDistribution {
    /// Build a distribution, failing fast on malformed input
    pub fn new(types: Vec<AgentType>) -> Result<Self, ConfigError> {
        if types.is_empty() {
            return Err(ConfigError::EmptyTypeSet);
        }

        let mut seen = HashSet::with_capacity(types.len());
        for agent_type in &types {
            agent_type.validate()?;
            if !seen.insert(agent_type.name.as_str()) {
                return Err(ConfigError::DuplicateType(agent_type.name.clone()));
            }
        }

        let total: f64 = types.iter().map(|t| t.prob).sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ConfigError::ProbabilitySum(total));
        }

        Ok(Self { types })
    }

    /// Two-type distribution used throughout the reference scenario
    pub fn two_type(low: AgentType, high: AgentType) -> Result<Self, ConfigError> {
        Self::new(vec![low, high])
    }

    pub fn types(&self) -> &[AgentType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AgentType> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentType> {
        self.types.iter()
    }

    /// Probability weights in declaration order
    pub fn weights(&self) -> Vec<f64> {
        self.types.iter().map(|t| t.prob).collect()
    }

    /// Type indices sorted by ascending efficiency (stable for equal thetas)
    pub fn efficiency_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.types.len()).collect();
        order.sort_by(|&a, &b| self.types[a].theta.total_cmp(&self.types[b].theta));
        order
    }
}
