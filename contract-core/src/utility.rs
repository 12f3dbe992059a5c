//! Utility model shared by every allocation regime
//!
//! Agent:     `theta * ln(1 + R + eps) - P`
//! Principal: `P - (c1 * R + c2 * R^2)`
//!
//! with `R` the granted resource in MHz, clamped to be non-negative. The
//! Principal's cost is convex and independent of who receives the resource.

use crate::{ConfigError, Contract};
use serde::{Deserialize, Serialize};

/// Default guard against the zero-resource singularity of the log derivative
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Cost coefficients and numerical epsilon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilityModel {
    /// Linear operating cost per MHz
    pub c1: f64,
    /// Quadratic operating cost per MHz^2
    pub c2: f64,
    /// Added inside the logarithm
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

impl Default for UtilityModel {
    fn default() -> Self {
        Self {
            c1: 0.01,
            c2: 0.005,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl UtilityModel {
    pub fn new(c1: f64, c2: f64) -> Self {
        Self {
            c1,
            c2,
            ..Default::default()
        }
    }

    /// Set epsilon (builder pattern)
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = |c: f64| c.is_finite() && c >= 0.0;
        if !valid(self.c1) || !valid(self.c2) {
            return Err(ConfigError::InvalidCost {
                c1: self.c1,
                c2: self.c2,
            });
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ConfigError::InvalidEpsilon(self.epsilon));
        }
        Ok(())
    }

    /// Agent utility from accepting `contract` with efficiency `theta`
    #[inline]
    pub fn agent_utility(&self, contract: &Contract, theta: f64) -> f64 {
        self.benefit_mhz(contract.resource_mhz(), theta) - contract.payment()
    }

    /// Principal utility when an agent accepts `contract`
    ///
    /// `_theta` is accepted for symmetry with [`Self::agent_utility`]; the
    /// operating cost depends only on the resource granted.
    #[inline]
    pub fn principal_utility(&self, contract: &Contract, _theta: f64) -> f64 {
        contract.payment() - self.cost_mhz(contract.resource_mhz())
    }

    /// Social welfare of a single grant: transfers cancel out
    #[inline]
    pub fn social_welfare(&self, contract: &Contract, theta: f64) -> f64 {
        self.agent_utility(contract, theta) + self.principal_utility(contract, theta)
    }

    /// Gross benefit `theta * ln(1 + r + eps)` of `r` MHz
    #[inline]
    pub fn benefit_mhz(&self, resource_mhz: f64, theta: f64) -> f64 {
        theta * (1.0 + resource_mhz.max(0.0) + self.epsilon).ln()
    }

    /// d(benefit)/dr
    #[inline]
    pub fn benefit_slope_mhz(&self, resource_mhz: f64, theta: f64) -> f64 {
        theta / (1.0 + resource_mhz.max(0.0) + self.epsilon)
    }

    /// Operating cost `c1 * r + c2 * r^2` of `r` MHz
    #[inline]
    pub fn cost_mhz(&self, resource_mhz: f64) -> f64 {
        let r = resource_mhz.max(0.0);
        self.c1 * r + self.c2 * r * r
    }

    /// d(cost)/dr
    #[inline]
    pub fn cost_slope_mhz(&self, resource_mhz: f64) -> f64 {
        self.c1 + 2.0 * self.c2 * resource_mhz.max(0.0)
    }

    /// Full-information surplus `benefit - cost` of `r` MHz for type `theta`
    #[inline]
    pub fn social_welfare_mhz(&self, resource_mhz: f64, theta: f64) -> f64 {
        self.benefit_mhz(resource_mhz, theta) - self.cost_mhz(resource_mhz)
    }
}
