//! Least-squares problem definition and finite differences.
//!
//! The minimizers see a fit as a [`Problem`]: a residual vector as a function
//! of a parameter vector. [`CurveProblem`] adapts a [`FitModel`] and a set of
//! samples to that interface.

use std::cell::RefCell;
use std::fmt;

use ndarray::{Array1, Array2};

use crate::error::{FitGraphError, Result};
use crate::fit::model::FitModel;

/// A nonlinear least squares problem.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

/// Outcome of a minimizer run.
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Best parameter values found
    pub params: Array1<f64>,

    /// Sum of squared residuals at `params`
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Whether a convergence criterion was met
    pub converged: bool,
}

impl fmt::Display for Minimum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cost {:.6e} after {} iterations (converged: {}), params {:?}",
            self.cost, self.iterations, self.converged, self.params
        )
    }
}

/// Residuals `model(x_i) - y_i` of a model over a set of samples.
///
/// The model is mutated on every evaluation; after a minimizer returns, the
/// caller writes the parameters it wants to keep.
pub struct CurveProblem<'a> {
    model: RefCell<&'a mut dyn FitModel>,
    x: &'a [f64],
    y: &'a [f64],
}

impl<'a> CurveProblem<'a> {
    /// Creates a problem over paired samples.
    ///
    /// # Arguments
    ///
    /// * `model` - The model whose parameters are optimized
    /// * `x` - Independent variable samples
    /// * `y` - Observed values, same length as `x`
    pub fn new(model: &'a mut dyn FitModel, x: &'a [f64], y: &'a [f64]) -> Self {
        Self {
            model: RefCell::new(model),
            x,
            y,
        }
    }
}

impl Problem for CurveProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let mut model = self.model.borrow_mut();
        if params.len() != model.parameter_count() {
            return Err(FitGraphError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                model.parameter_count(),
                params.len()
            )));
        }
        model.set_parameters(&params.to_vec());
        Ok(self
            .x
            .iter()
            .zip(self.y)
            .map(|(x, y)| model.evaluate(*x) - y)
            .collect())
    }

    fn parameter_count(&self) -> usize {
        self.model.borrow().parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.x.len()
    }
}

/// Finite difference step for a parameter, scaled to its magnitude.
fn step_for(value: f64, eps: f64) -> f64 {
    if value.abs() > 1.0 {
        value.abs() * eps
    } else {
        eps
    }
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// J[i,j] = ∂residual[i]/∂param[j].
pub fn jacobian(problem: &dyn Problem, params: &Array1<f64>, eps: f64) -> Result<Array2<f64>> {
    let n_params = params.len();
    let residuals = problem.eval(params)?;
    let n_residuals = residuals.len();

    let mut jac = Array2::zeros((n_residuals, n_params));
    for j in 0..n_params {
        let mut perturbed = params.clone();
        let eps_j = step_for(params[j], eps);
        perturbed[j] += eps_j;

        let residuals_perturbed = problem.eval(&perturbed)?;
        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}

/// Compute the gradient of a scalar function using central finite differences.
pub fn gradient<F>(f: F, params: &Array1<f64>, eps: f64) -> Result<Array1<f64>>
where
    F: Fn(&Array1<f64>) -> Result<f64>,
{
    let mut grad = Array1::zeros(params.len());
    for j in 0..params.len() {
        let eps_j = step_for(params[j], eps);
        let mut forward = params.clone();
        forward[j] += eps_j;
        let mut backward = params.clone();
        backward[j] -= eps_j;

        grad[j] = (f(&forward)? - f(&backward)?) / (2.0 * eps_j);
    }
    Ok(grad)
}

/// Compute the Hessian matrix of a scalar function using central finite differences.
pub fn hessian<F>(f: F, params: &Array1<f64>, eps: f64) -> Result<Array2<f64>>
where
    F: Fn(&Array1<f64>) -> Result<f64>,
{
    let n_params = params.len();
    let mut hess = Array2::zeros((n_params, n_params));
    let f0 = f(params)?;

    for i in 0..n_params {
        let eps_i = step_for(params[i], eps);
        for j in 0..=i {
            let eps_j = step_for(params[j], eps);

            if i == j {
                let mut plus = params.clone();
                let mut minus = params.clone();
                plus[i] += eps_i;
                minus[i] -= eps_i;
                hess[[i, i]] = (f(&plus)? - 2.0 * f0 + f(&minus)?) / (eps_i * eps_i);
            } else {
                let mut pp = params.clone();
                let mut pm = params.clone();
                let mut mp = params.clone();
                let mut mm = params.clone();
                pp[i] += eps_i;
                pp[j] += eps_j;
                pm[i] += eps_i;
                pm[j] -= eps_j;
                mp[i] -= eps_i;
                mp[j] += eps_j;
                mm[i] -= eps_i;
                mm[j] -= eps_j;

                hess[[i, j]] = (f(&pp)? - f(&pm)? - f(&mp)? + f(&mm)?) / (4.0 * eps_i * eps_j);
                hess[[j, i]] = hess[[i, j]];
            }
        }
    }

    Ok(hess)
}
