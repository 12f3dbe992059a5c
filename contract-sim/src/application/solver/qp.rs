//! Strictly convex QP subproblem
//!
//! ```text
//! minimize    1/2 d^T B d + g^T d
//! subject to  A d >= b
//! ```
//!
//! Solved through its dual, a non-negatively bounded QP in the multipliers
//!
//! ```text
//! minimize    1/2 mu^T H mu - w^T mu      H = A B^-1 A^T,  w = A B^-1 g + b
//! subject to  mu >= 0
//! ```
//!
//! by a Lawson-Hanson active-set method, which terminates with the exact
//! optimum of each free subproblem. `H` gets a tiny diagonal shift so that
//! linearly dependent rows (the two IC rows of equally efficient types, for
//! instance) still factor. The primal step is `d = B^-1 (A^T mu - g)`.

use super::SolverError;
use super::linalg::{Cholesky, Matrix, norm_inf};
use ndarray::Array1;

/// How the QP subproblem ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpStatus {
    Optimal,
    /// Active-set iteration cap reached before the dual optimality check passed
    IterationLimit,
    /// No step satisfies every linearized row
    Inconsistent,
}

/// Primal step and dual multipliers of the QP subproblem
#[derive(Debug, Clone)]
pub struct QpSolution {
    pub step: Array1<f64>,
    /// One multiplier per row of `A`, all `>= 0`
    pub multipliers: Array1<f64>,
    pub status: QpStatus,
}

/// Rows with a squared norm below this carry no information
const DEGENERATE_ROW: f64 = 1e-14;

/// Diagonal shift of the dual Hessian, relative to its largest diagonal entry
const DUAL_SHIFT: f64 = 1e-13;

/// Linearized row violation, relative to `1 + |b|`, that marks the rows inconsistent
const INCONSISTENCY: f64 = 1e-6;

pub fn solve_dual_qp(
    hessian: &Matrix,
    linear: &Array1<f64>,
    a: &Matrix,
    b: &Array1<f64>,
    max_iterations: usize,
    tolerance: f64,
) -> Result<QpSolution, SolverError> {
    let chol = Cholesky::factor(hessian).ok_or(SolverError::IndefiniteHessian)?;
    let n = hessian.nrows();
    let p = a.nrows();

    // u0 = B^-1 g, column j of v = B^-1 a_j
    let u0 = chol.solve(linear.view());
    let mut v = Matrix::zeros((n, p));
    for j in 0..p {
        v.column_mut(j).assign(&chol.solve(a.row(j)));
    }
    let h = a.dot(&v);
    let w = a.dot(&u0) + b;

    let max_diag = h.diag().iter().fold(0.0_f64, |acc, d| acc.max(*d));
    let shift = DUAL_SHIFT * max_diag;
    let scale = 1.0 + b.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));

    let mut mu = Array1::<f64>::zeros(p);
    let mut passive: Vec<usize> = Vec::with_capacity(p);
    // Rows whose entry broke the factorization or left at once; numerically dependent
    let mut blocked: Vec<usize> = Vec::new();
    let mut status = QpStatus::Optimal;
    let mut iterations = 0;

    'outer: loop {
        // w - H mu is the primal violation b_j - a_j^T d of each row
        let residual = &w - &h.dot(&mu);
        // The shift leaves residuals of order shift * mu on rows already in play
        let threshold = tolerance * scale + 100.0 * shift * (1.0 + norm_inf(&mu));
        let entering = (0..p)
            .filter(|j| !passive.contains(j) && !blocked.contains(j) && h[(*j, *j)] > DEGENERATE_ROW)
            .filter(|&j| residual[j] > threshold)
            .max_by(|&i, &j| residual[i].total_cmp(&residual[j]));
        let Some(entering) = entering else {
            break;
        };
        if iterations >= max_iterations {
            status = QpStatus::IterationLimit;
            break;
        }
        passive.push(entering);

        loop {
            iterations += 1;
            let Some(free) = solve_free(&h, &w, &passive, shift) else {
                passive.retain(|&j| j != entering);
                blocked.push(entering);
                continue 'outer;
            };

            if free.iter().all(|&s| s > 0.0) {
                for (k, &j) in passive.iter().enumerate() {
                    mu[j] = free[k];
                }
                break;
            }

            // Move toward the free solution until the first multiplier hits zero
            let mut alpha = 1.0_f64;
            let mut leaving = None;
            for (k, &j) in passive.iter().enumerate() {
                if free[k] <= 0.0 {
                    let denom = mu[j] - free[k];
                    let ratio = if denom > 0.0 { mu[j] / denom } else { 0.0 };
                    if leaving.is_none() || ratio < alpha {
                        alpha = ratio;
                        leaving = Some(j);
                    }
                }
            }
            for (k, &j) in passive.iter().enumerate() {
                mu[j] += alpha * (free[k] - mu[j]);
            }
            if let Some(j) = leaving {
                mu[j] = 0.0;
            }
            passive.retain(|&j| {
                let keep = mu[j] > 0.0;
                if !keep {
                    mu[j] = 0.0;
                }
                keep
            });

            if !passive.contains(&entering) {
                blocked.push(entering);
                continue 'outer;
            }
        }
    }

    let step = v.dot(&mu) - &u0;

    if status == QpStatus::Optimal {
        let worst = (0..p)
            .map(|j| b[j] - a.row(j).dot(&step))
            .fold(0.0_f64, f64::max);
        if !(worst <= INCONSISTENCY * scale) {
            status = QpStatus::Inconsistent;
        }
    }

    Ok(QpSolution {
        step,
        multipliers: mu,
        status,
    })
}

/// Unconstrained dual optimum over the passive rows
fn solve_free(h: &Matrix, w: &Array1<f64>, passive: &[usize], shift: f64) -> Option<Array1<f64>> {
    let k = passive.len();
    let sub = Matrix::from_shape_fn((k, k), |(r, c)| {
        h[(passive[r], passive[c])] + if r == c { shift } else { 0.0 }
    });
    let rhs = Array1::from_shape_fn(k, |r| w[passive[r]]);
    Cholesky::factor(&sub).map(|chol| chol.solve(rhs.view()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_unconstrained_minimum() {
        // minimize 1/2 |d|^2 - [1, 2] d  => d = [1, 2]
        let h = Matrix::eye(2);
        let a = Matrix::zeros((0, 2));
        let sol = solve_dual_qp(&h, &array![-1.0, -2.0], &a, &Array1::zeros(0), 100, 1e-14).unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert_abs_diff_eq!(sol.step[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sol.step[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_active_constraint() {
        // minimize 1/2 |d|^2 - [1, 1] d  s.t.  -d0 - d1 >= -1  => d = [0.5, 0.5]
        let h = Matrix::eye(2);
        let a = array![[-1.0, -1.0]];
        let sol = solve_dual_qp(&h, &array![-1.0, -1.0], &a, &array![-1.0], 100, 1e-14).unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert_abs_diff_eq!(sol.step[0], 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(sol.step[1], 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(sol.multipliers[0], 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_inactive_constraint_has_zero_multiplier() {
        // minimize 1/2 |d|^2 + d0  s.t.  d0 >= -5  => d0 = -1
        let h = Matrix::eye(1);
        let a = array![[1.0]];
        let sol = solve_dual_qp(&h, &array![1.0], &a, &array![-5.0], 100, 1e-14).unwrap();
        assert_abs_diff_eq!(sol.step[0], -1.0, epsilon = 1e-12);
        assert_eq!(sol.multipliers[0], 0.0);
    }

    #[test]
    fn test_corner_with_dependent_rows() {
        // minimize 1/2 |d|^2 + [1, 1] d  s.t.  d0 >= 0, d1 >= 0, d0 + d1 >= 0, -d0 >= 0
        // Optimum d = 0 with rows 0 and 2 linearly dependent on the others
        let h = Matrix::eye(2);
        let a = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [-1.0, 0.0]];
        let b = array![0.0, 0.0, 0.0, 0.0];
        let sol = solve_dual_qp(&h, &array![1.0, 1.0], &a, &b, 100, 1e-14).unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert_abs_diff_eq!(sol.step[0], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(sol.step[1], 0.0, epsilon = 1e-10);
        for row in 0..a.nrows() {
            assert!(a.row(row).dot(&sol.step) >= b[row] - 1e-10);
        }
        assert!(sol.multipliers.iter().all(|m| *m >= 0.0));
    }

    #[test]
    fn test_inconsistent_rows_detected() {
        // d >= 0.5 and -d >= 0.5 cannot both hold
        let h = Matrix::eye(1);
        let a = array![[1.0], [-1.0]];
        let sol = solve_dual_qp(&h, &array![1.0], &a, &array![0.5, 0.5], 100, 1e-14).unwrap();
        assert_eq!(sol.status, QpStatus::Inconsistent);
    }

    #[test]
    fn test_iteration_limit_reported() {
        let h = Matrix::eye(2);
        let a = array![[-1.0, -1.0]];
        let sol = solve_dual_qp(&h, &array![-1.0, -1.0], &a, &array![-1.0], 0, 1e-14).unwrap();
        assert_eq!(sol.status, QpStatus::IterationLimit);
    }

    #[test]
    fn test_indefinite_rejected() {
        let mut h = Matrix::eye(2);
        h[(0, 0)] = 0.0;
        let a = Matrix::zeros((0, 2));
        let result = solve_dual_qp(&h, &array![0.0, 0.0], &a, &Array1::zeros(0), 10, 1e-12);
        assert!(matches!(result, Err(SolverError::IndefiniteHessian)));
    }
}
