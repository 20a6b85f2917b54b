//! Dense solvers for the normal equations, backed by faer.
//!
//! The fitter works on `ndarray` arrays; systems are copied into faer
//! matrices for the factorization and the solution is copied back.

use faer::prelude::*;
use faer::{Mat, Side};
use ndarray::{Array1, Array2};

use crate::error::{FitGraphError, Result};

/// Copy an ndarray matrix into a faer matrix.
fn ndarray_to_faer(a: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Copy a vector into a single-column faer matrix.
fn ndarray_vec_to_faer(b: &Array1<f64>) -> Mat<f64> {
    Mat::from_fn(b.len(), 1, |i, _| b[i])
}

/// Copy the first column of a faer matrix back into a vector, rejecting
/// non-finite entries.
fn faer_col_to_ndarray(x: &Mat<f64>) -> Result<Array1<f64>> {
    let solution: Array1<f64> = (0..x.nrows()).map(|i| x[(i, 0)]).collect();
    if solution.iter().all(|v| v.is_finite()) {
        Ok(solution)
    } else {
        Err(FitGraphError::SingularMatrix)
    }
}

/// Solve `a * x = b` for symmetric positive definite `a` by Cholesky (LLᵀ)
/// decomposition.
///
/// # Arguments
///
/// * `a` - The symmetric coefficient matrix
/// * `b` - The right-hand side vector
///
/// # Returns
///
/// * The solution vector, or [`FitGraphError::SingularMatrix`] when `a` is
///   not positive definite
pub fn solve_cholesky(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    check_square(a, b)?;
    let llt = ndarray_to_faer(a)
        .llt(Side::Lower)
        .map_err(|_| FitGraphError::SingularMatrix)?;
    faer_col_to_ndarray(&llt.solve(&ndarray_vec_to_faer(b)))
}

/// Solve `a * x = b` by LU decomposition with partial pivoting.
///
/// # Arguments
///
/// * `a` - The square coefficient matrix
/// * `b` - The right-hand side vector
///
/// # Returns
///
/// * The solution vector, or [`FitGraphError::SingularMatrix`] when the
///   factorization produces a non-finite solution
pub fn solve_gaussian(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    check_square(a, b)?;
    let lu = ndarray_to_faer(a).partial_piv_lu();
    faer_col_to_ndarray(&lu.solve(&ndarray_vec_to_faer(b)))
}

fn check_square(a: &Array2<f64>, b: &Array1<f64>) -> Result<()> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(FitGraphError::DimensionMismatch(format!(
            "cannot solve a {}x{} system with a right-hand side of length {}",
            a.nrows(),
            a.ncols(),
            b.len()
        )));
    }
    Ok(())
}
