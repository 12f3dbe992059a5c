//! Mechanism Design Optimizer
//!
//! Computes the Principal's optimal screening menu for a finite type set.
//!
//! Decision vector (MHz for resources): `[R_0, P_0, R_1, P_1, ...]` in
//! distribution order. Objective: maximize `sum_i p_i * (P_i - cost(R_i))`.
//!
//! Constraints, all `>= 0`:
//! - `IR_i`:  `u_i(c_i)`
//! - `IC_ij`: `u_i(c_i) - u_i(c_j) - margin_ij`, where `margin_ij = ic_margin`
//!   if `theta_i > theta_j` and zero otherwise. The margin keeps the solver
//!   from collapsing both contracts onto one point.

use super::MechanismError;
use crate::application::solver::{Matrix, NonlinearProgram, NonlinearSolver, SqpConfig, SqpSolver};
use contract_core::{Contract, ContractMenu, TypeDistribution, UtilityModel};
use serde::{Deserialize, Serialize};

/// Tunables of the screening optimizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignerConfig {
    /// Strict-preference margin on the IC constraint of the more efficient type
    pub ic_margin: f64,
    /// Solver iteration cap
    pub max_iterations: usize,
    /// Solver convergence tolerance
    pub tolerance: f64,
    /// Largest IR/IC violation accepted when auditing the solved menu
    pub audit_tolerance: f64,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            ic_margin: 1e-6,
            max_iterations: 1000,
            tolerance: 1e-9,
            audit_tolerance: 1e-6,
        }
    }
}

impl DesignerConfig {
    /// Set IC margin (builder pattern)
    pub fn with_ic_margin(mut self, ic_margin: f64) -> Self {
        self.ic_margin = ic_margin;
        self
    }

    /// Solver configured from these tunables
    pub fn sqp_solver(&self) -> SqpSolver {
        SqpSolver::new(SqpConfig {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ..Default::default()
        })
    }
}

/// Screening program handed to the solver
struct ScreeningProblem<'a> {
    types: &'a TypeDistribution,
    model: &'a UtilityModel,
    ic_margin: f64,
    /// `(i, j, margin)` for every ordered pair `i != j`
    ic_pairs: Vec<(usize, usize, f64)>,
}

impl<'a> ScreeningProblem<'a> {
    fn new(types: &'a TypeDistribution, model: &'a UtilityModel, ic_margin: f64) -> Self {
        let t = types.types();
        let mut ic_pairs = Vec::with_capacity(t.len() * t.len().saturating_sub(1));
        for i in 0..t.len() {
            for j in 0..t.len() {
                if i != j {
                    let margin = if t[i].theta > t[j].theta { ic_margin } else { 0.0 };
                    ic_pairs.push((i, j, margin));
                }
            }
        }
        Self {
            types,
            model,
            ic_margin,
            ic_pairs,
        }
    }

    #[inline]
    fn resource(x: &[f64], i: usize) -> f64 {
        x[2 * i].max(0.0)
    }

    #[inline]
    fn payment(x: &[f64], i: usize) -> f64 {
        x[2 * i + 1]
    }

    /// Feasible separating start: resources increase with efficiency and
    /// payments climb at the midpoint efficiency, so every IC holds with slack.
    fn initial_guess(&self) -> Vec<f64> {
        let t = self.types.types();
        let mut x = vec![0.0; 2 * t.len()];
        let order = self.types.efficiency_order();

        let mut prev: Option<(usize, f64)> = None;
        for (rank, &i) in order.iter().enumerate() {
            let r = 1.0 + 4.0 * rank as f64;
            let benefit = self.model.benefit_mhz(r, 1.0);
            let payment = match prev {
                None => 0.5 * t[i].theta * benefit,
                Some((k, prev_payment)) => {
                    let prev_benefit = self.model.benefit_mhz(x[2 * k], 1.0);
                    let margin = if t[i].theta > t[k].theta { self.ic_margin } else { 0.0 };
                    prev_payment + 0.5 * (t[k].theta + t[i].theta) * (benefit - prev_benefit) - margin
                }
            };
            x[2 * i] = r;
            x[2 * i + 1] = payment;
            prev = Some((i, payment));
        }
        x
    }
}

impl NonlinearProgram for ScreeningProblem<'_> {
    fn dimension(&self) -> usize {
        2 * self.types.len()
    }

    fn num_constraints(&self) -> usize {
        self.types.len() + self.ic_pairs.len()
    }

    fn objective(&self, x: &[f64]) -> f64 {
        -self
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| t.prob * (Self::payment(x, i) - self.model.cost_mhz(Self::resource(x, i))))
            .sum::<f64>()
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; self.dimension()];
        for (i, t) in self.types.iter().enumerate() {
            grad[2 * i] = t.prob * self.model.cost_slope_mhz(Self::resource(x, i));
            grad[2 * i + 1] = -t.prob;
        }
        grad
    }

    fn constraints(&self, x: &[f64]) -> Vec<f64> {
        let t = self.types.types();
        let own = |i: usize| self.model.benefit_mhz(Self::resource(x, i), t[i].theta) - Self::payment(x, i);

        let mut g = Vec::with_capacity(self.num_constraints());
        for i in 0..t.len() {
            g.push(own(i));
        }
        for &(i, j, margin) in &self.ic_pairs {
            let mimic = self.model.benefit_mhz(Self::resource(x, j), t[i].theta) - Self::payment(x, j);
            g.push(own(i) - mimic - margin);
        }
        g
    }

    fn jacobian(&self, x: &[f64]) -> Matrix {
        let t = self.types.types();
        let mut jac = Matrix::zeros((self.num_constraints(), self.dimension()));

        for i in 0..t.len() {
            jac[(i, 2 * i)] = self.model.benefit_slope_mhz(Self::resource(x, i), t[i].theta);
            jac[(i, 2 * i + 1)] = -1.0;
        }
        for (row, &(i, j, _)) in self.ic_pairs.iter().enumerate() {
            let row = t.len() + row;
            jac[(row, 2 * i)] = self.model.benefit_slope_mhz(Self::resource(x, i), t[i].theta);
            jac[(row, 2 * i + 1)] = -1.0;
            jac[(row, 2 * j)] = -self.model.benefit_slope_mhz(Self::resource(x, j), t[i].theta);
            jac[(row, 2 * j + 1)] = 1.0;
        }
        jac
    }

    fn lower_bounds(&self) -> Vec<Option<f64>> {
        (0..self.dimension())
            .map(|k| if k % 2 == 0 { Some(0.0) } else { None })
            .collect()
    }
}

/// Screening-menu optimizer, generic over the constrained solver
pub struct MechanismDesigner<S: NonlinearSolver = SqpSolver> {
    config: DesignerConfig,
    solver: S,
}

impl MechanismDesigner<SqpSolver> {
    pub fn new(config: DesignerConfig) -> Self {
        let solver = config.sqp_solver();
        Self { config, solver }
    }
}

impl Default for MechanismDesigner<SqpSolver> {
    fn default() -> Self {
        Self::new(DesignerConfig::default())
    }
}

impl<S: NonlinearSolver> MechanismDesigner<S> {
    /// Use a different solver
    pub fn with_solver(config: DesignerConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    /// Solve for the optimal menu
    ///
    /// Never returns a partial menu: a solver failure or a solved point that
    /// breaks IR/IC beyond `audit_tolerance` is an error.
    pub fn design(
        &self,
        types: &TypeDistribution,
        model: &UtilityModel,
    ) -> Result<ContractMenu, MechanismError> {
        let problem = ScreeningProblem::new(types, model, self.config.ic_margin);
        let x0 = problem.initial_guess();

        let solution = self
            .solver
            .minimize(&problem, &x0)
            .map_err(|source| MechanismError::NotConverged {
                mechanism: "contract design",
                source,
            })?;

        let contracts = (0..types.len())
            .map(|i| {
                Contract::from_mhz(
                    ScreeningProblem::resource(&solution.x, i),
                    ScreeningProblem::payment(&solution.x, i),
                )
            })
            .collect();
        let menu = ContractMenu::for_distribution(types, contracts).ok_or_else(|| {
            MechanismError::ConstraintViolation {
                constraint: "menu coverage".to_string(),
                slack: f64::NAN,
            }
        })?;

        self.audit(&menu, types, model)?;

        tracing::info!(
            iterations = solution.iterations,
            expected_profit = -solution.objective,
            menu = %menu,
            "contract menu designed"
        );
        Ok(menu)
    }

    fn audit(
        &self,
        menu: &ContractMenu,
        types: &TypeDistribution,
        model: &UtilityModel,
    ) -> Result<(), MechanismError> {
        let Some(audit) = menu.audit(model, types) else {
            return Err(MechanismError::ConstraintViolation {
                constraint: "menu coverage".to_string(),
                slack: f64::NAN,
            });
        };
        let tol = self.config.audit_tolerance;
        if audit.min_ir_slack < -tol {
            return Err(MechanismError::ConstraintViolation {
                constraint: format!("IR[{}]", audit.worst_ir),
                slack: audit.min_ir_slack,
            });
        }
        if audit.min_ic_slack < -tol {
            let (i, j) = audit.worst_ic.unwrap_or_default();
            return Err(MechanismError::ConstraintViolation {
                constraint: format!("IC[{} vs {}]", i, j),
                slack: audit.min_ic_slack,
            });
        }
        Ok(())
    }
}

/// Known optimum for exactly two types
///
/// The low type's IR and the high type's IC bind; resources solve
///
/// ```text
/// theta_h / (1 + R_h) = cost'(R_h)
/// (theta_l - (p_h / p_l) (theta_h - theta_l)) / (1 + R_l) = cost'(R_l)   (R_l = 0 if no root)
/// ```
///
/// Returns `None` unless there are exactly two types and marginal cost grows.
pub fn closed_form_two_type(
    types: &TypeDistribution,
    model: &UtilityModel,
    ic_margin: f64,
) -> Option<ContractMenu> {
    if types.len() != 2 || (model.c1 == 0.0 && model.c2 == 0.0) {
        return None;
    }
    let order = types.efficiency_order();
    let (li, hi) = (order[0], order[1]);
    let low = &types.types()[li];
    let high = &types.types()[hi];

    let foc_root = |theta: f64| -> f64 {
        let foc = |r: f64| model.benefit_slope_mhz(r, theta) - model.cost_slope_mhz(r);
        if theta <= 0.0 || foc(0.0) <= 0.0 {
            return 0.0;
        }
        let mut upper = 1.0;
        while foc(upper) > 0.0 && upper < 1e12 {
            upper *= 2.0;
        }
        let mut lower = 0.0;
        for _ in 0..200 {
            let mid = 0.5 * (lower + upper);
            if foc(mid) > 0.0 {
                lower = mid;
            } else {
                upper = mid;
            }
        }
        0.5 * (lower + upper)
    };

    let r_high = foc_root(high.theta);
    let virtual_theta = low.theta - (high.prob / low.prob) * (high.theta - low.theta);
    let r_low = foc_root(virtual_theta);

    let p_low = model.benefit_mhz(r_low, low.theta);
    let margin = if high.theta > low.theta { ic_margin } else { 0.0 };
    let p_high = p_low + model.benefit_mhz(r_high, high.theta) - model.benefit_mhz(r_low, high.theta) - margin;

    let mut contracts = vec![Contract::NULL; 2];
    contracts[li] = Contract::from_mhz(r_low, p_low);
    contracts[hi] = Contract::from_mhz(r_high, p_high);
    ContractMenu::for_distribution(types, contracts)
}
