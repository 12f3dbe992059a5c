//! Centralized Optimizer
//!
//! A social planner that observes every agent's type and assigns each type
//! the resource maximizing expected social welfare. No payments, no IR/IC:
//! this is the full-information upper bound.

use super::MechanismError;
use super::designer::DesignerConfig;
use crate::application::solver::{Matrix, NonlinearProgram, NonlinearSolver, SqpSolver};
use contract_core::{Contract, ContractMenu, HZ_PER_MHZ, TypeDistribution, UtilityModel};

/// Per-type resource grants chosen by the planner
#[derive(Debug, Clone, PartialEq)]
pub struct CentralizedAllocation {
    grants: ContractMenu,
}

impl CentralizedAllocation {
    /// Zero-payment grant for an agent of type `type_name`
    pub fn grant_for(&self, type_name: &str) -> Option<&Contract> {
        self.grants.get(type_name)
    }

    /// Resource in Hz for `type_name`
    pub fn resource_for(&self, type_name: &str) -> Option<f64> {
        self.grant_for(type_name).map(Contract::resource)
    }

    pub fn grants(&self) -> &ContractMenu {
        &self.grants
    }
}

/// Expected social welfare over per-type resources (MHz)
struct WelfareProblem<'a> {
    types: &'a TypeDistribution,
    model: &'a UtilityModel,
}

impl NonlinearProgram for WelfareProblem<'_> {
    fn dimension(&self) -> usize {
        self.types.len()
    }

    fn num_constraints(&self) -> usize {
        0
    }

    fn objective(&self, x: &[f64]) -> f64 {
        -self
            .types
            .iter()
            .zip(x)
            .map(|(t, &r)| t.prob * self.model.social_welfare_mhz(r, t.theta))
            .sum::<f64>()
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        self.types
            .iter()
            .zip(x)
            .map(|(t, &r)| -t.prob * (self.model.benefit_slope_mhz(r, t.theta) - self.model.cost_slope_mhz(r)))
            .collect()
    }

    fn constraints(&self, _x: &[f64]) -> Vec<f64> {
        Vec::new()
    }

    fn jacobian(&self, _x: &[f64]) -> Matrix {
        Matrix::zeros((0, self.dimension()))
    }

    fn lower_bounds(&self) -> Vec<Option<f64>> {
        vec![Some(0.0); self.dimension()]
    }
}

pub struct CentralizedOptimizer<S: NonlinearSolver = SqpSolver> {
    solver: S,
}

impl CentralizedOptimizer<SqpSolver> {
    /// Same solver settings as the contract designer
    pub fn new(config: &DesignerConfig) -> Self {
        Self {
            solver: config.sqp_solver(),
        }
    }
}

impl<S: NonlinearSolver> CentralizedOptimizer<S> {
    pub fn with_solver(solver: S) -> Self {
        Self { solver }
    }

    pub fn solve(
        &self,
        types: &TypeDistribution,
        model: &UtilityModel,
    ) -> Result<CentralizedAllocation, MechanismError> {
        let problem = WelfareProblem { types, model };
        // 5, 10, 15 ... MHz by ascending efficiency
        let mut x0 = vec![0.0; types.len()];
        for (rank, &i) in types.efficiency_order().iter().enumerate() {
            x0[i] = 5.0 * (rank + 1) as f64;
        }

        let solution = self
            .solver
            .minimize(&problem, &x0)
            .map_err(|source| MechanismError::NotConverged {
                mechanism: "centralized",
                source,
            })?;

        let grants: Vec<Contract> = solution
            .x
            .iter()
            .map(|&r| Contract::grant(r.max(0.0) * HZ_PER_MHZ))
            .collect();
        let grants = ContractMenu::for_distribution(types, grants).ok_or_else(|| {
            MechanismError::ConstraintViolation {
                constraint: "allocation coverage".to_string(),
                slack: f64::NAN,
            }
        })?;

        tracing::info!(
            iterations = solution.iterations,
            expected_welfare = -solution.objective,
            allocation = %grants,
            "centralized allocation solved"
        );
        Ok(CentralizedAllocation { grants })
    }
}
