//! Levenberg-Marquardt minimizer.
//!
//! Each iteration solves the damped normal equations
//! `(JᵀJ + λ·diag(JᵀJ))·δ = -Jᵀr` and accepts the step only if it lowers the
//! sum of squared residuals. λ shrinks after an accepted step and grows after
//! a rejected one.
//!
//! # Example
//!
//! ```
//! use fitgraph::fit::{CurveProblem, ExpressionModel, FitConfig, FreeParameter, LevenbergMarquardt};
//! use ndarray::array;
//!
//! let x = [0.0, 1.0, 2.0, 3.0];
//! let y = [1.0, 3.0, 5.0, 7.0];
//! let mut model = ExpressionModel::new(
//!     "a*x + b",
//!     "x",
//!     &[FreeParameter::new("a", 0.0), FreeParameter::new("b", 0.0)],
//! )
//! .unwrap();
//! let problem = CurveProblem::new(&mut model, &x, &y);
//!
//! let minimum = LevenbergMarquardt::new(FitConfig::default().with_max_iterations(100))
//!     .minimize(&problem, array![0.0, 0.0])
//!     .unwrap();
//! assert!((minimum.params[0] - 2.0).abs() < 1e-4);
//! assert!((minimum.params[1] - 1.0).abs() < 1e-4);
//! ```

use ndarray::Array1;
use tracing::trace;

use crate::error::{FitGraphError, Result};
use crate::fit::config::FitConfig;
use crate::fit::linalg::{solve_cholesky, solve_gaussian};
use crate::fit::problem::{jacobian, Minimum, Problem};

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    config: FitConfig,
}

impl LevenbergMarquardt {
    /// Creates a new Levenberg-Marquardt optimizer.
    ///
    /// # Arguments
    ///
    /// * `config` - Iteration budget, tolerance, finite-difference step and the
    ///   damping schedule in [`FitConfig::lm`]
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    /// Minimize the sum of squared residuals starting from `initial_params`.
    ///
    /// # Arguments
    ///
    /// * `problem` - The residuals to minimize
    /// * `initial_params` - Starting parameter values
    ///
    /// # Returns
    ///
    /// * The best parameters found, their cost, the iteration count and
    ///   whether a convergence criterion was met. The cost never exceeds the
    ///   starting cost: only steps that lower it are accepted.
    ///
    /// # Errors
    ///
    /// * [`FitGraphError::DimensionMismatch`] if `initial_params` does not
    ///   match the problem's parameter count
    /// * Any error from evaluating the problem
    pub fn minimize(&self, problem: &dyn Problem, initial_params: Array1<f64>) -> Result<Minimum> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(FitGraphError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let lm = &self.config.lm;
        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut cost: f64 = residuals.iter().map(|r| r.powi(2)).sum();
        let mut lambda = lm.initial_lambda;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations && cost.is_finite() {
            iterations += 1;

            let jac = jacobian(problem, &params, self.config.finite_difference_step)?;
            let j_t_j = jac.t().dot(&jac);
            let j_t_r = jac.t().dot(&residuals);

            let gradient_norm = j_t_r.dot(&j_t_r).sqrt();
            if gradient_norm <= self.config.tolerance * cost.max(f64::MIN_POSITIVE).sqrt() {
                converged = true;
                break;
            }

            // Add lambda to the diagonal of J^T * J
            let mut augmented = j_t_j.clone();
            for i in 0..n_params {
                augmented[[i, i]] += lambda * j_t_j[[i, i]].max(1e-10);
            }
            let rhs = -&j_t_r;
            let solved =
                solve_cholesky(&augmented, &rhs).or_else(|_| solve_gaussian(&augmented, &rhs));
            let step = match solved {
                Ok(step) => step,
                Err(_) => {
                    lambda = (lambda * lm.lambda_up_factor).min(lm.max_lambda);
                    if lambda >= lm.max_lambda {
                        break;
                    }
                    continue;
                }
            };

            let new_params = &params + &step;
            let new_residuals = problem.eval(&new_params)?;
            let new_cost: f64 = new_residuals.iter().map(|r| r.powi(2)).sum();
            trace!(iteration = iterations, lambda, cost, new_cost, "levenberg-marquardt step");

            if new_cost < cost {
                let param_change = step
                    .iter()
                    .zip(params.iter())
                    .map(|(d, p)| d.abs() / (p.abs() + self.config.tolerance))
                    .fold(0.0, f64::max);
                let cost_change = (cost - new_cost) / cost.max(f64::MIN_POSITIVE);

                params = new_params;
                residuals = new_residuals;
                cost = new_cost;
                lambda = (lambda * lm.lambda_down_factor).max(lm.min_lambda);

                if param_change < self.config.tolerance || cost_change < self.config.tolerance {
                    converged = true;
                    break;
                }
            } else {
                // Step rejected
                lambda = (lambda * lm.lambda_up_factor).min(lm.max_lambda);
                if lambda >= lm.max_lambda {
                    break;
                }
            }
        }

        Ok(Minimum {
            params,
            cost,
            iterations,
            converged,
        })
    }
}
