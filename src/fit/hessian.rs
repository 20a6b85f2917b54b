//! Newton minimizer on the finite-difference Hessian of the cost.
//!
//! The step solves `H·δ = -∇f`. When `H` is not positive definite its
//! diagonal is shifted until it is, and the step is halved until the cost
//! decreases.

use ndarray::{Array1, Array2};
use tracing::trace;

use crate::error::{FitGraphError, Result};
use crate::fit::config::FitConfig;
use crate::fit::linalg::solve_cholesky;
use crate::fit::problem::{gradient, hessian, Minimum, Problem};

const MAX_SHIFTS: usize = 20;
const MAX_HALVINGS: usize = 16;

/// Second-order minimizer of the sum of squared residuals.
#[derive(Debug, Clone)]
pub struct HessianMinimizer {
    config: FitConfig,
}

impl HessianMinimizer {
    /// Creates a new Newton minimizer.
    ///
    /// # Arguments
    ///
    /// * `config` - Iteration budget, tolerance and finite-difference step
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// Minimize the sum of squared residuals starting from `initial_params`.
    ///
    /// Each iteration takes a Newton step on the numeric Hessian of the cost,
    /// shifting the diagonal until the Hessian is positive definite and halving
    /// the step until the cost does not increase.
    ///
    /// # Arguments
    ///
    /// * `problem` - The residuals to minimize
    /// * `initial_params` - Starting parameter values
    ///
    /// # Returns
    ///
    /// * The best parameters found; never worse than the start
    ///
    /// # Errors
    ///
    /// * [`FitGraphError::DimensionMismatch`] if `initial_params` does not match
    ///   the problem's parameter count
    pub fn minimize(&self, problem: &dyn Problem, initial_params: Array1<f64>) -> Result<Minimum> {
        if initial_params.len() != problem.parameter_count() {
            return Err(FitGraphError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                problem.parameter_count(),
                initial_params.len()
            )));
        }

        let cost_fn = |p: &Array1<f64>| problem.eval_cost(p);
        let eps = self.config.finite_difference_step;
        let tol = self.config.tolerance;

        let mut params = initial_params;
        let mut cost = cost_fn(&params)?;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations && cost.is_finite() {
            iterations += 1;

            let grad = gradient(cost_fn, &params, eps)?;
            let hess = hessian(cost_fn, &params, eps)?;
            if grad.iter().chain(hess.iter()).any(|v| !v.is_finite()) {
                break;
            }
            if grad.dot(&grad).sqrt() <= tol * cost.max(f64::MIN_POSITIVE) {
                converged = true;
                break;
            }

            let Some(mut step) = self.newton_step(&hess, &grad) else {
                break;
            };

            let mut accepted = None;
            for _ in 0..MAX_HALVINGS {
                let candidate = &params + &step;
                let candidate_cost = cost_fn(&candidate)?;
                if candidate_cost < cost {
                    accepted = Some((candidate, candidate_cost));
                    break;
                }
                step.mapv_inplace(|d| d * 0.5);
            }
            let Some((new_params, new_cost)) = accepted else {
                // No descent along the Newton direction
                break;
            };
            trace!(iteration = iterations, cost, new_cost, "newton step");

            let param_change = (&new_params - &params)
                .iter()
                .zip(params.iter())
                .map(|(d, p)| d.abs() / (p.abs() + tol))
                .fold(0.0, f64::max);
            let cost_change = (cost - new_cost) / cost.max(f64::MIN_POSITIVE);
            params = new_params;
            cost = new_cost;

            if param_change < tol || cost_change < tol {
                converged = true;
                break;
            }
        }

        Ok(Minimum {
            params,
            cost,
            iterations,
            converged,
        })
    }

    /// Solve `H·δ = -g`, shifting the diagonal of `H` until it factors.
    fn newton_step(&self, hess: &Array2<f64>, grad: &Array1<f64>) -> Option<Array1<f64>> {
        let rhs = -grad;
        if let Ok(step) = solve_cholesky(hess, &rhs) {
            return Some(step);
        }

        let scale = hess
            .diag()
            .iter()
            .fold(0.0_f64, |acc, d| acc.max(d.abs()))
            .max(1.0);
        let mut shift = 1e-6 * scale;
        for _ in 0..MAX_SHIFTS {
            let mut shifted = hess.clone();
            for i in 0..shifted.nrows() {
                shifted[[i, i]] += shift;
            }
            if let Ok(step) = solve_cholesky(&shifted, &rhs) {
                return Some(step);
            }
            shift *= 10.0;
        }
        None
    }
}
