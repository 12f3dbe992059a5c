//! Dense linear algebra for tiny systems
//!
//! Problems here have a handful of variables (two per agent type). Storage
//! and products come from `ndarray`; the only factorization needed is an
//! unpivoted Cholesky.

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Data, Ix1};

/// Dense `rows x cols` matrix
pub type Matrix = Array2<f64>;

/// Lower-triangular factor `L` of an SPD matrix `M = L L^T`
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Matrix,
}

impl Cholesky {
    /// `None` unless `m` is square and numerically positive definite
    pub fn factor(m: &Matrix) -> Option<Self> {
        let n = m.nrows();
        if m.ncols() != n {
            return None;
        }
        let mut l = Matrix::zeros((n, n));
        for j in 0..n {
            let mut diag = m[(j, j)];
            for k in 0..j {
                diag -= l[(j, k)] * l[(j, k)];
            }
            if !(diag.is_finite() && diag > 0.0) {
                return None;
            }
            let ljj = diag.sqrt();
            l[(j, j)] = ljj;
            for i in (j + 1)..n {
                let mut sum = m[(i, j)];
                for k in 0..j {
                    sum -= l[(i, k)] * l[(j, k)];
                }
                l[(i, j)] = sum / ljj;
            }
        }
        Some(Self { l })
    }

    /// Solve `M x = b`
    pub fn solve(&self, b: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.l.nrows();
        // forward: L y = b
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let mut sum = b[i];
            for k in 0..i {
                sum -= self.l[(i, k)] * y[k];
            }
            y[i] = sum / self.l[(i, i)];
        }
        // backward: L^T x = y
        let mut x = Array1::zeros(n);
        for i in (0..n).rev() {
            let mut sum = y[i];
            for k in (i + 1)..n {
                sum -= self.l[(k, i)] * x[k];
            }
            x[i] = sum / self.l[(i, i)];
        }
        x
    }
}

#[inline]
pub fn norm_inf<S: Data<Elem = f64>>(v: &ArrayBase<S, Ix1>) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}
