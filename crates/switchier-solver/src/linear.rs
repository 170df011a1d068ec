//! Linear system solvers and norms.

use faer::prelude::*;
use faer::sparse::{SparseColMat, Triplet};
use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Systems with this many or more variables use the sparse solver path.
pub const SPARSE_THRESHOLD: usize = 50;

/// Relative pivot-underflow threshold: a pivot below
/// `EPS_PIVOT_REL · max|G_ij|` is treated as singular.
pub const EPS_PIVOT_REL: f64 = 1e-14;

/// Solve a dense system Ax = b using LU with partial pivoting.
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    if a.nrows() != a.ncols() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: a.ncols(),
        });
    }
    if a.nrows() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: b.len(),
        });
    }

    let max_abs = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let lu = a.clone().lu();
    let u = lu.u();
    for k in 0..a.nrows() {
        if u[(k, k)].abs() <= EPS_PIVOT_REL * max_abs {
            return Err(Error::SingularMatrix);
        }
    }
    lu.solve(b).ok_or(Error::SingularMatrix)
}

/// Solve a sparse system Ax = b from matrix triplets using sparse LU.
///
/// Duplicate entries at the same position are summed by faer during
/// assembly.
pub fn solve_sparse(
    size: usize,
    triplets: &[(usize, usize, f64)],
    rhs: &DVector<f64>,
) -> Result<DVector<f64>> {
    if size != rhs.len() {
        return Err(Error::DimensionMismatch {
            expected: size,
            actual: rhs.len(),
        });
    }

    let faer_triplets: Vec<_> = triplets
        .iter()
        .map(|&(r, c, v)| Triplet::new(r, c, v))
        .collect();

    let sparse_mat = SparseColMat::<usize, f64>::try_new_from_triplets(size, size, &faer_triplets)
        .map_err(|_| Error::SingularMatrix)?;

    let lu = sparse_mat.sp_lu().map_err(|_| Error::SingularMatrix)?;

    let faer_rhs = Col::<f64>::from_fn(size, |i| rhs[i]);
    let faer_x = lu.solve(&faer_rhs);

    Ok(DVector::from_fn(size, |i, _| faer_x[i]))
}

/// Infinity norm of the residual `A·x − b`.
pub fn residual_norm(a: &DMatrix<f64>, x: &DVector<f64>, b: &DVector<f64>) -> f64 {
    (a * x - b).amax()
}

/// Infinity norm of the residual computed from matrix triplets.
pub fn residual_norm_triplets(
    size: usize,
    triplets: &[(usize, usize, f64)],
    x: &DVector<f64>,
    b: &DVector<f64>,
) -> f64 {
    let mut r = -b.clone();
    for &(row, col, v) in triplets {
        r[row] += v * x[col];
    }
    (0..size).fold(0.0_f64, |m, i| m.max(r[i].abs()))
}

/// Cheap 1-norm condition estimate `‖A‖₁ · est(‖A⁻¹‖₁)`.
///
/// Uses a few Hager probes through the LU factors; the estimate is a lower
/// bound on the true condition number.
pub fn condition_estimate(a: &DMatrix<f64>) -> Result<f64> {
    let n = a.nrows();
    if n == 0 {
        return Ok(0.0);
    }
    let norm_a = (0..n)
        .map(|j| a.column(j).iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0_f64, f64::max);

    let lu = a.clone().lu();
    let lu_t = a.transpose().lu();

    let mut x = DVector::from_element(n, 1.0 / n as f64);
    let mut est = 0.0;
    for _ in 0..4 {
        let y = lu.solve(&x).ok_or(Error::SingularMatrix)?;
        est = y.iter().map(|v| v.abs()).sum::<f64>();
        let xi = y.map(|v| if v >= 0.0 { 1.0 } else { -1.0 });
        let z = lu_t.solve(&xi).ok_or(Error::SingularMatrix)?;
        let (j, zmax) = z
            .iter()
            .enumerate()
            .fold((0, 0.0_f64), |(bj, bv), (i, v)| {
                if v.abs() > bv { (i, v.abs()) } else { (bj, bv) }
            });
        if zmax <= z.dot(&x) {
            break;
        }
        x = DVector::zeros(n);
        x[j] = 1.0;
    }
    Ok(norm_a * est)
}
