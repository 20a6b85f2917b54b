//! Closed-form polynomial least squares.

use ndarray::{Array1, Array2};

use crate::error::{FitGraphError, Result};
use crate::fit::linalg::solve_gaussian;

/// Least-squares coefficients of a polynomial of fixed `degree`, highest
/// power first.
///
/// Degree 1 uses the direct slope/intercept formulas; higher degrees solve
/// the normal equations of the Vandermonde system.
pub fn fit_polynomial(x: &[f64], y: &[f64], degree: usize) -> Result<Vec<f64>> {
    if x.len() != y.len() {
        return Err(FitGraphError::DimensionMismatch(format!(
            "x has {} samples, y has {}",
            x.len(),
            y.len()
        )));
    }
    let n_coeffs = degree + 1;
    if x.len() < n_coeffs {
        return Err(FitGraphError::InvalidInput(format!(
            "a degree {} polynomial needs at least {} points, got {}",
            degree,
            n_coeffs,
            x.len()
        )));
    }

    match degree {
        0 => Ok(vec![y.iter().sum::<f64>() / y.len() as f64]),
        1 => fit_line(x, y).map(|(slope, intercept)| vec![slope, intercept]),
        _ => fit_normal_equations(x, y, n_coeffs),
    }
}

fn fit_line(x: &[f64], y: &[f64]) -> Result<(f64, f64)> {
    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xx: f64 = x.iter().map(|x| x * x).sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(x, y)| x * y).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return Err(FitGraphError::SingularMatrix);
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    Ok((slope, intercept))
}

fn fit_normal_equations(x: &[f64], y: &[f64], n_coeffs: usize) -> Result<Vec<f64>> {
    // Column k holds x^k
    let mut a = Array2::<f64>::zeros((n_coeffs, n_coeffs));
    let mut b = Array1::<f64>::zeros(n_coeffs);
    for (&xi, &yi) in x.iter().zip(y) {
        let powers: Vec<f64> = (0..2 * n_coeffs - 1).map(|k| xi.powi(k as i32)).collect();
        for row in 0..n_coeffs {
            for col in 0..n_coeffs {
                a[[row, col]] += powers[row + col];
            }
            b[row] += powers[row] * yi;
        }
    }

    let ascending = solve_gaussian(&a, &b)?;
    Ok(ascending.iter().rev().copied().collect())
}
