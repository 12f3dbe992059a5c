//! Sequential Quadratic Programming
//!
//! Each iteration linearizes the constraints around the current point and
//! solves a convex QP whose Hessian is a damped-BFGS approximation of the
//! Lagrangian's. Steps are globalized with an L1 exact-penalty merit function
//! and Armijo backtracking. A rejected full step gets one second-order
//! correction before backtracking, which keeps curved active constraints from
//! stalling the iterate just short of feasibility. Bounds ride along as extra
//! QP rows and are also enforced by projection, so iterates never leave the box.

use super::linalg::{Cholesky, Matrix, norm_inf};
use super::qp::{QpSolution, QpStatus, solve_dual_qp};
use super::{NonlinearProgram, NonlinearSolver, Solution, SolverError, violation_l1, violation_max};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqpConfig {
    /// Outer iteration cap
    pub max_iterations: usize,
    /// Convergence tolerance on the QP step (infinity norm)
    pub tolerance: f64,
    /// Largest accepted constraint violation at convergence
    pub feasibility_tolerance: f64,
    /// Active-set iteration cap for one QP subproblem
    pub qp_max_iterations: usize,
    /// Relative violation below which a QP row is considered satisfied
    pub qp_tolerance: f64,
    /// Armijo sufficient-decrease constant
    pub armijo: f64,
    /// Smallest step fraction tried before giving up
    pub min_step: f64,
}

impl Default for SqpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-9,
            feasibility_tolerance: 1e-10,
            qp_max_iterations: 500,
            qp_tolerance: 1e-14,
            armijo: 1e-4,
            min_step: 1e-10,
        }
    }
}

/// SQP solver for [`NonlinearProgram`]s
#[derive(Debug, Clone, Default)]
pub struct SqpSolver {
    config: SqpConfig,
}

/// Function values at an iterate
struct Point {
    x: Vec<f64>,
    f: f64,
    grad: Array1<f64>,
    g: Array1<f64>,
    jac: Matrix,
}

impl Point {
    fn evaluate(problem: &dyn NonlinearProgram, x: Vec<f64>) -> Self {
        let f = problem.objective(&x);
        let grad = Array1::from(problem.gradient(&x));
        let g = Array1::from(problem.constraints(&x));
        let jac = problem.jacobian(&x);
        Self { x, f, grad, g, jac }
    }

    fn is_finite(&self) -> bool {
        self.f.is_finite()
            && self.grad.iter().all(|v| v.is_finite())
            && self.g.iter().all(|v| v.is_finite())
            && self.jac.iter().all(|v| v.is_finite())
    }

    fn merit(&self, penalty: f64) -> f64 {
        self.f + penalty * violation_l1(&self.g)
    }

    /// Gradient of the Lagrangian `f - lambda^T g` for fixed multipliers
    fn lagrangian_gradient(&self, lambda: &Array1<f64>) -> Array1<f64> {
        &self.grad - &self.jac.t().dot(lambda)
    }

    fn into_solution(self, lambda: &Array1<f64>, iterations: usize) -> Solution {
        Solution {
            objective: self.f,
            multipliers: lambda.to_vec(),
            max_violation: violation_max(&self.g),
            iterations,
            x: self.x,
        }
    }
}

impl SqpSolver {
    pub fn new(config: SqpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SqpConfig {
        &self.config
    }

    /// Set iteration cap (builder pattern)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set step tolerance (builder pattern)
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    fn project(x: &mut [f64], bounds: &[Option<f64>]) {
        for (xi, lb) in x.iter_mut().zip(bounds) {
            if let Some(lb) = lb {
                if *xi < *lb {
                    *xi = *lb;
                }
            }
        }
    }

    /// Linearized constraints and bound rows as `A d >= b`
    fn qp_constraints(point: &Point, bounds: &[Option<f64>]) -> (Matrix, Array1<f64>) {
        let n = point.x.len();
        let m = point.g.len();
        let bounded: Vec<(usize, f64)> = bounds
            .iter()
            .enumerate()
            .filter_map(|(i, lb)| lb.map(|lb| (i, lb)))
            .collect();

        let mut a = Matrix::zeros((m + bounded.len(), n));
        let mut b = Array1::zeros(m + bounded.len());

        for j in 0..m {
            a.row_mut(j).assign(&point.jac.row(j));
            b[j] = -point.g[j];
        }
        for (row, (i, lb)) in bounded.into_iter().enumerate() {
            a[(m + row, i)] = 1.0;
            b[m + row] = lb - point.x[i];
        }

        (a, b)
    }

    /// Solve the QP subproblem, retrying once from the identity when the
    /// active-set loop runs out of iterations
    fn subproblem(
        &self,
        hessian: &mut Matrix,
        point: &Point,
        a: &Matrix,
        b: &Array1<f64>,
        iteration: usize,
    ) -> Result<QpSolution, SolverError> {
        let cfg = &self.config;
        let mut qp = solve_dual_qp(hessian, &point.grad, a, b, cfg.qp_max_iterations, cfg.qp_tolerance)?;
        if qp.status == QpStatus::IterationLimit {
            tracing::debug!(iteration, "qp iteration cap hit, restarting from identity hessian");
            *hessian = Matrix::eye(hessian.nrows());
            qp = solve_dual_qp(hessian, &point.grad, a, b, cfg.qp_max_iterations, cfg.qp_tolerance)?;
        }
        match qp.status {
            QpStatus::Optimal => Ok(qp),
            QpStatus::IterationLimit => Err(SolverError::QpIterationLimit { iteration }),
            QpStatus::Inconsistent => Err(SolverError::InconsistentConstraints { iteration }),
        }
    }

    fn trial(
        problem: &dyn NonlinearProgram,
        point: &Point,
        d: &Array1<f64>,
        alpha: f64,
        bounds: &[Option<f64>],
    ) -> Point {
        let mut x: Vec<f64> = point.x.iter().zip(d).map(|(xi, di)| xi + alpha * di).collect();
        Self::project(&mut x, bounds);
        Point::evaluate(problem, x)
    }

    /// Re-solve the QP with each row shifted by the curvature seen at the full step:
    /// `A d' >= A d - g(x + d)`
    #[allow(clippy::too_many_arguments)]
    fn second_order_correction(
        &self,
        problem: &dyn NonlinearProgram,
        hessian: &Matrix,
        point: &Point,
        a: &Matrix,
        b: &Array1<f64>,
        d: &Array1<f64>,
        full: &Point,
        bounds: &[Option<f64>],
    ) -> Option<Point> {
        let mut shifted = b.clone();
        for j in 0..point.g.len() {
            shifted[j] = a.row(j).dot(d) - full.g[j];
        }
        let cfg = &self.config;
        let qp = solve_dual_qp(hessian, &point.grad, a, &shifted, cfg.qp_max_iterations, cfg.qp_tolerance).ok()?;
        if qp.status != QpStatus::Optimal {
            return None;
        }
        let corrected = Self::trial(problem, point, &qp.step, 1.0, bounds);
        corrected.is_finite().then_some(corrected)
    }

    /// Powell-damped BFGS update keeping `hessian` positive definite
    fn update_hessian(hessian: &mut Matrix, s: &Array1<f64>, y: &Array1<f64>) {
        let bs = hessian.dot(s);
        let sbs = s.dot(&bs);
        if !(sbs.is_finite() && sbs > 1e-16) {
            return;
        }

        let sy = s.dot(y);
        let y = if sy < 0.2 * sbs {
            let theta = 0.8 * sbs / (sbs - sy);
            y * theta + &bs * (1.0 - theta)
        } else {
            y.clone()
        };
        let sy = s.dot(&y);
        if !(sy.is_finite() && sy > 1e-16) {
            return;
        }

        hessian.scaled_add(1.0 / sy, &outer(&y, &y));
        hessian.scaled_add(-1.0 / sbs, &outer(&bs, &bs));

        if Cholesky::factor(hessian).is_none() {
            *hessian = Matrix::eye(s.len());
        }
    }
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Matrix {
    Matrix::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

impl NonlinearSolver for SqpSolver {
    fn minimize(&self, problem: &dyn NonlinearProgram, x0: &[f64]) -> Result<Solution, SolverError> {
        let n = problem.dimension();
        let m = problem.num_constraints();
        if x0.len() != n {
            return Err(SolverError::Dimension {
                expected: n,
                actual: x0.len(),
            });
        }

        let cfg = &self.config;
        let bounds = problem.lower_bounds();

        let mut x = x0.to_vec();
        Self::project(&mut x, &bounds);
        let mut point = Point::evaluate(problem, x);
        if !point.is_finite() {
            return Err(SolverError::NonFinite { iteration: 0 });
        }

        let mut hessian = Matrix::eye(n);
        let mut penalty = 1.0_f64;

        for iteration in 1..=cfg.max_iterations {
            let (a, b) = Self::qp_constraints(&point, &bounds);
            let qp = self.subproblem(&mut hessian, &point, &a, &b, iteration)?;
            let d = qp.step;
            let lambda: Array1<f64> = qp.multipliers.iter().take(m).copied().collect();

            let step_norm = norm_inf(&d);
            let violation = violation_max(&point.g);
            if step_norm <= cfg.tolerance && violation <= cfg.feasibility_tolerance {
                tracing::debug!(iteration, objective = point.f, "sqp converged on step norm");
                return Ok(point.into_solution(&lambda, iteration));
            }

            let max_lambda = lambda.iter().fold(0.0_f64, |acc, l| acc.max(*l));
            penalty = penalty.max(1.5 * max_lambda + 1e-2);

            let merit0 = point.merit(penalty);
            let slope = point.grad.dot(&d) - penalty * violation_l1(&point.g);
            let noise = 1e-14 * (1.0 + merit0.abs());

            let mut alpha = 1.0;
            let accepted = loop {
                let target = merit0 + cfg.armijo * alpha * slope.min(0.0) + noise;
                let trial = Self::trial(problem, &point, &d, alpha, &bounds);
                if trial.is_finite() && trial.merit(penalty) <= target {
                    break Some(trial);
                }

                if alpha == 1.0 && trial.is_finite() {
                    let corrected =
                        self.second_order_correction(problem, &hessian, &point, &a, &b, &d, &trial, &bounds);
                    if let Some(corrected) = corrected.filter(|c| c.merit(penalty) <= target) {
                        tracing::trace!(iteration, "second-order correction accepted");
                        break Some(corrected);
                    }
                }

                alpha *= 0.5;
                if alpha < cfg.min_step {
                    break None;
                }
            };

            let Some(trial) = accepted else {
                if violation <= cfg.feasibility_tolerance && step_norm <= cfg.tolerance.sqrt() {
                    tracing::debug!(iteration, "sqp stalled at a feasible point, accepting");
                    return Ok(point.into_solution(&lambda, iteration));
                }
                return Err(SolverError::LineSearchFailed { iteration });
            };

            let merit_change = (merit0 - trial.merit(penalty)).abs();
            let s: Array1<f64> = trial.x.iter().zip(&point.x).map(|(a, b)| a - b).collect();
            let y = trial.lagrangian_gradient(&lambda) - point.lagrangian_gradient(&lambda);
            Self::update_hessian(&mut hessian, &s, &y);

            point = trial;

            let violation = violation_max(&point.g);
            if alpha == 1.0
                && violation <= cfg.feasibility_tolerance
                && step_norm <= 1e3 * cfg.tolerance
                && merit_change <= cfg.tolerance * (1.0 + merit0.abs())
            {
                tracing::debug!(iteration, objective = point.f, "sqp converged on merit change");
                return Ok(point.into_solution(&lambda, iteration));
            }

            if iteration % 100 == 0 {
                tracing::trace!(iteration, objective = point.f, violation, step_norm, alpha, "sqp progress");
            }
        }

        Err(SolverError::MaxIterations {
            iterations: cfg.max_iterations,
            violation: violation_max(&point.g),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// minimize (x - 3)^2 + (y - 2)^2  s.t.  x + y <= 2,  x >= 0
    struct Disk;

    impl NonlinearProgram for Disk {
        fn dimension(&self) -> usize {
            2
        }
        fn num_constraints(&self) -> usize {
            1
        }
        fn objective(&self, x: &[f64]) -> f64 {
            (x[0] - 3.0).powi(2) + (x[1] - 2.0).powi(2)
        }
        fn gradient(&self, x: &[f64]) -> Vec<f64> {
            vec![2.0 * (x[0] - 3.0), 2.0 * (x[1] - 2.0)]
        }
        fn constraints(&self, x: &[f64]) -> Vec<f64> {
            vec![2.0 - x[0] - x[1]]
        }
        fn jacobian(&self, _x: &[f64]) -> Matrix {
            array![[-1.0, -1.0]]
        }
        fn lower_bounds(&self) -> Vec<Option<f64>> {
            vec![Some(0.0), None]
        }
    }

    /// maximize ln(1 + x) - 0.1 x  over x >= 0  (optimum x = 9)
    struct Concave;

    impl NonlinearProgram for Concave {
        fn dimension(&self) -> usize {
            1
        }
        fn num_constraints(&self) -> usize {
            0
        }
        fn objective(&self, x: &[f64]) -> f64 {
            -((1.0 + x[0]).ln() - 0.1 * x[0])
        }
        fn gradient(&self, x: &[f64]) -> Vec<f64> {
            vec![-(1.0 / (1.0 + x[0]) - 0.1)]
        }
        fn constraints(&self, _x: &[f64]) -> Vec<f64> {
            Vec::new()
        }
        fn jacobian(&self, _x: &[f64]) -> Matrix {
            Matrix::zeros((0, 1))
        }
        fn lower_bounds(&self) -> Vec<Option<f64>> {
            vec![Some(0.0)]
        }
    }

    /// maximize x + y on the unit circle, y >= 0  (optimum at 45 degrees)
    struct Circle;

    impl NonlinearProgram for Circle {
        fn dimension(&self) -> usize {
            2
        }
        fn num_constraints(&self) -> usize {
            1
        }
        fn objective(&self, x: &[f64]) -> f64 {
            -(x[0] + x[1])
        }
        fn gradient(&self, _x: &[f64]) -> Vec<f64> {
            vec![-1.0, -1.0]
        }
        fn constraints(&self, x: &[f64]) -> Vec<f64> {
            vec![1.0 - x[0] * x[0] - x[1] * x[1]]
        }
        fn jacobian(&self, x: &[f64]) -> Matrix {
            array![[-2.0 * x[0], -2.0 * x[1]]]
        }
        fn lower_bounds(&self) -> Vec<Option<f64>> {
            vec![None, Some(0.0)]
        }
    }

    /// x >= 1 and x <= 0
    struct Contradiction;

    impl NonlinearProgram for Contradiction {
        fn dimension(&self) -> usize {
            1
        }
        fn num_constraints(&self) -> usize {
            2
        }
        fn objective(&self, x: &[f64]) -> f64 {
            x[0] * x[0]
        }
        fn gradient(&self, x: &[f64]) -> Vec<f64> {
            vec![2.0 * x[0]]
        }
        fn constraints(&self, x: &[f64]) -> Vec<f64> {
            vec![x[0] - 1.0, -x[0]]
        }
        fn jacobian(&self, _x: &[f64]) -> Matrix {
            array![[1.0], [-1.0]]
        }
    }

    #[test]
    fn test_linear_constraint_active() {
        let solver = SqpSolver::default();
        let sol = solver.minimize(&Disk, &[0.0, 0.0]).unwrap();
        // Projection of (3, 2) onto x + y = 2 is (1.5, 0.5)
        assert_abs_diff_eq!(sol.x[0], 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.x[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.multipliers[0], 3.0, epsilon = 1e-4);
        assert!(sol.max_violation <= 1e-9);
    }

    #[test]
    fn test_interior_optimum_with_bounds() {
        let solver = SqpSolver::default();
        let sol = solver.minimize(&Concave, &[1.0]).unwrap();
        assert_abs_diff_eq!(sol.x[0], 9.0, epsilon = 1e-4);
    }

    #[test]
    fn test_starts_infeasible() {
        let solver = SqpSolver::default();
        let sol = solver.minimize(&Disk, &[5.0, 5.0]).unwrap();
        assert!(sol.max_violation <= 1e-9);
        assert_abs_diff_eq!(sol.x[0] + sol.x[1], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_curved_active_constraint_reaches_feasibility() {
        let solver = SqpSolver::default();
        let sol = solver.minimize(&Circle, &[0.5, 0.0]).unwrap();
        let corner = 0.5f64.sqrt();
        assert!(sol.max_violation <= 1e-10, "violation {}", sol.max_violation);
        assert_abs_diff_eq!(sol.x[0], corner, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.x[1], corner, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.multipliers[0], corner, epsilon = 1e-4);
    }

    #[test]
    fn test_dimension_mismatch() {
        let solver = SqpSolver::default();
        let result = solver.minimize(&Disk, &[1.0]);
        assert_eq!(result.unwrap_err(), SolverError::Dimension { expected: 2, actual: 1 });
    }

    #[test]
    fn test_iteration_cap_reported() {
        let solver = SqpSolver::default().with_max_iterations(1);
        let result = solver.minimize(&Concave, &[0.0]);
        assert!(matches!(result, Err(SolverError::MaxIterations { iterations: 1, .. })));
    }

    #[test]
    fn test_inconsistent_linearization_fails_fast() {
        let solver = SqpSolver::default();
        let result = solver.minimize(&Contradiction, &[0.5]);
        assert_eq!(result.unwrap_err(), SolverError::InconsistentConstraints { iteration: 1 });
    }

    #[test]
    fn test_qp_iteration_cap_is_an_error() {
        let solver = SqpSolver::new(SqpConfig {
            qp_max_iterations: 0,
            ..Default::default()
        });
        // The unconstrained step from the origin overshoots x + y <= 2
        let result = solver.minimize(&Disk, &[0.0, 0.0]);
        assert_eq!(result.unwrap_err(), SolverError::QpIterationLimit { iteration: 1 });
    }
}
