//! Constrained Nonlinear Solver
//!
//! A pluggable interface for the small inequality-constrained programs the
//! mechanisms need, plus a sequential-quadratic-programming implementation.
//!
//! # Problem form
//!
//! ```text
//! minimize    f(x)
//! subject to  g_j(x) >= 0        j = 1..m
//!             x_i >= lb_i        for bounded coordinates
//! ```
//!
//! Any solver honouring [`NonlinearSolver`] can replace [`SqpSolver`]; the
//! mechanism code only depends on the trait.

mod linalg;
mod qp;
mod sqp;

pub use linalg::Matrix;
pub use sqp::{SqpConfig, SqpSolver};

use thiserror::Error;

/// A smooth inequality-constrained minimization problem
pub trait NonlinearProgram {
    /// Number of decision variables
    fn dimension(&self) -> usize;

    /// Number of inequality constraints `g(x) >= 0`
    fn num_constraints(&self) -> usize;

    fn objective(&self, x: &[f64]) -> f64;

    fn gradient(&self, x: &[f64]) -> Vec<f64>;

    /// Constraint values, `num_constraints()` entries
    fn constraints(&self, x: &[f64]) -> Vec<f64>;

    /// Constraint Jacobian, `num_constraints() x dimension()`
    fn jacobian(&self, x: &[f64]) -> Matrix;

    /// Per-coordinate lower bound, `None` for a free variable
    fn lower_bounds(&self) -> Vec<Option<f64>> {
        vec![None; self.dimension()]
    }
}

/// Converged point of a [`NonlinearProgram`]
#[derive(Debug, Clone)]
pub struct Solution {
    pub x: Vec<f64>,
    pub objective: f64,
    /// Multipliers of the general constraints (bounds excluded)
    pub multipliers: Vec<f64>,
    /// Largest violation `max(0, -g_j(x))`
    pub max_violation: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("Initial point has {actual} entries, problem has {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("No convergence after {iterations} iterations (violation {violation:.3e})")]
    MaxIterations { iterations: usize, violation: f64 },

    #[error("Line search failed at iteration {iteration}")]
    LineSearchFailed { iteration: usize },

    #[error("Non-finite value encountered at iteration {iteration}")]
    NonFinite { iteration: usize },

    #[error("QP subproblem Hessian is not positive definite")]
    IndefiniteHessian,

    #[error("QP subproblem hit its iteration cap at iteration {iteration}")]
    QpIterationLimit { iteration: usize },

    #[error("Linearized constraints are inconsistent at iteration {iteration}")]
    InconsistentConstraints { iteration: usize },
}

/// Solver seam used by the mechanisms
pub trait NonlinearSolver: Send + Sync {
    fn minimize(&self, problem: &dyn NonlinearProgram, x0: &[f64]) -> Result<Solution, SolverError>;
}

/// Sum of constraint violations `sum_j max(0, -g_j)`
pub(crate) fn violation_l1<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values.into_iter().map(|&g| (-g).max(0.0)).sum()
}

/// Largest constraint violation `max_j max(0, -g_j)`
pub(crate) fn violation_max<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values.into_iter().fold(0.0_f64, |acc, &g| acc.max(-g))
}
